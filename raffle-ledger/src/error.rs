use std::io;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    amount::Amount,
    number::{TicketNumber, format_numbers},
    raffle::RaffleId,
    reservation::{ReservationId, ReservationStatus},
};

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Failures raised by a [`crate::store::ReservationStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("numbers already held or sold: {}", format_numbers(numbers))]
    NumbersTaken { numbers: Vec<TicketNumber> },
    #[error("reservation {id} is {actual}, expected {expected}")]
    StatusConflict {
        id: ReservationId,
        expected: ReservationStatus,
        actual: ReservationStatus,
    },
    #[error("version conflict for reservation {id}: expected {expected}, actual {actual}")]
    VersionConflict {
        id: ReservationId,
        expected: u32,
        actual: u32,
    },
    #[error("reservation {id} not stored")]
    MissingReservation { id: ReservationId },
    #[error("raffle {id} not stored")]
    MissingRaffle { id: RaffleId },
    #[error("raffle {id} is not active")]
    RaffleInactive { id: RaffleId },
    #[error("ticket price for raffle {id} is {actual}, expected {expected}")]
    PriceChanged {
        id: RaffleId,
        expected: Amount,
        actual: Amount,
    },
    #[error("numbers not on sale: {}", format_numbers(numbers))]
    NumbersOffSale { numbers: Vec<TicketNumber> },
    #[error("raffle {id} is already active")]
    ActiveRaffleExists { id: RaffleId },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    /// Raised when a guarded update lost a race against another writer.
    pub fn is_write_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::StatusConflict { .. } | StoreError::VersionConflict { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },
    #[error("numbers already locked or sold: {}", format_numbers(numbers))]
    Conflict { numbers: Vec<TicketNumber> },
    #[error("reservation {id} not found")]
    NotFound { id: ReservationId },
    #[error("cannot {operation} reservation {id} while it is {status}")]
    InvalidState {
        id: ReservationId,
        status: ReservationStatus,
        operation: &'static str,
    },
    #[error("hold on reservation {id} expired at {deadline}")]
    Expired {
        id: ReservationId,
        deadline: DateTime<Utc>,
    },
    #[error("infrastructure error: {0}")]
    Infrastructure(#[from] StoreError),
}

impl LedgerError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        LedgerError::InvalidRequest {
            reason: reason.into(),
        }
    }
}
