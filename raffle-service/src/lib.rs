// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Buyer and organizer controllers over the reservation ledger.
//!
//! - [`PurchaseFlow`]: board view, local selection, checkout, payment proof.
//! - [`AdminConsole`]: session-gated raffle curation and purchase approval.
//! - [`LocalAuth`]: single admin credential behind the [`AuthService`] seam.

pub mod admin;
pub mod auth;
pub mod error;
pub mod purchase;

pub use admin::AdminConsole;
pub use auth::{AuthService, LocalAuth, PasswordResetRequest, Session};
pub use error::{AuthError, Result, ServiceError};
pub use purchase::{HoldReceipt, PurchaseFlow, RaffleView, Selection};
