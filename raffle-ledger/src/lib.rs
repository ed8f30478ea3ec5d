//! Reservation ledger for a 00-99 numbered raffle.
//!
//! The crate exposes:
//! - [`ReservationLedger`]: lifecycle API (hold, payment proof, confirm, cancel, unblock, sweep).
//! - [`ReservationStore`]: persistence seam with the uniqueness and guarded-update contracts,
//!   backed by [`MemoryStore`] or [`JsonFileStore`].
//! - [`Board`]: per-number availability resolved from the raffle record and live reservations.

pub mod amount;
pub mod availability;
pub mod clock;
pub mod config;
pub mod error;
pub mod file_store;
pub mod ledger;
pub mod number;
pub mod raffle;
pub mod reservation;
pub mod store;

pub use amount::{Amount, AmountParseError};
pub use availability::{Board, BoardEntry, BoardSummary, NumberStatus};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LedgerConfig;
pub use error::{LedgerError, Result, StoreError};
pub use file_store::JsonFileStore;
pub use ledger::ReservationLedger;
pub use number::{InvalidNumber, NUMBER_COUNT, TicketNumber, all_numbers, is_valid_number};
pub use raffle::{PaymentInstructions, RaffleConfig, RaffleDraft, RaffleId};
pub use reservation::{BuyerDetails, Reservation, ReservationId, ReservationStatus};
pub use store::{MemoryStore, ReservationStore, StatusFilter};
