use std::{collections::BTreeSet, fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{amount::Amount, number::TicketNumber, raffle::RaffleId};

pub type ReservationId = u64;

/// Closed lifecycle of a reservation.
///
/// ```text
/// Held --submit--> PendingConfirmation --confirm--> Confirmed
///  |  \                     |
///  |   --cancel--+          +--cancel--> Cancelled
///  +--timeout--> Expired
/// ```
///
/// Unblock deletes the record from any state and is not a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Held,
    PendingConfirmation,
    Confirmed,
    Cancelled,
    Expired,
}

impl ReservationStatus {
    pub const ALL: [Self; 5] = [
        ReservationStatus::Held,
        ReservationStatus::PendingConfirmation,
        ReservationStatus::Confirmed,
        ReservationStatus::Cancelled,
        ReservationStatus::Expired,
    ];

    /// Whether a reservation in this status keeps its numbers off the market.
    pub fn claims_numbers(self) -> bool {
        matches!(
            self,
            ReservationStatus::Held
                | ReservationStatus::PendingConfirmation
                | ReservationStatus::Confirmed
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ReservationStatus::Confirmed | ReservationStatus::Cancelled | ReservationStatus::Expired
        )
    }

    pub fn can_transition_to(self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, next),
            (Held, PendingConfirmation)
                | (Held, Cancelled)
                | (Held, Expired)
                | (PendingConfirmation, Confirmed)
                | (PendingConfirmation, Cancelled)
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            ReservationStatus::Held => "held",
            ReservationStatus::PendingConfirmation => "pending confirmation",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Details the buyer asserts when submitting payment proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyerDetails {
    pub name: String,
    pub phone: String,
    pub payment_reference: Option<String>,
}

/// A hold request that has passed validation, before the store assigns an id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewHold {
    pub raffle_id: RaffleId,
    pub numbers: BTreeSet<TicketNumber>,
    /// Per-number price the buyer saw; the insert is rejected if the raffle
    /// price moved since.
    pub ticket_price: Amount,
    pub total_amount: Amount,
    pub created_at: DateTime<Utc>,
    pub hold_deadline: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub raffle_id: RaffleId,
    pub numbers: BTreeSet<TicketNumber>,
    pub total_amount: Amount,
    pub buyer: Option<BuyerDetails>,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub hold_deadline: DateTime<Utc>,
    pub version: u32,
}

impl Reservation {
    pub fn from_hold(id: ReservationId, hold: NewHold) -> Self {
        Self {
            id,
            raffle_id: hold.raffle_id,
            numbers: hold.numbers,
            total_amount: hold.total_amount,
            buyer: None,
            status: ReservationStatus::Held,
            created_at: hold.created_at,
            hold_deadline: hold.hold_deadline,
            version: 1,
        }
    }

    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        now > self.hold_deadline
    }

    /// Advisory time left on a hold, for client countdowns. `None` once the
    /// reservation has left `Held`; zero when the deadline already passed.
    pub fn countdown(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.status != ReservationStatus::Held {
            return None;
        }
        Some(
            (self.hold_deadline - now)
                .to_std()
                .unwrap_or(Duration::ZERO),
        )
    }

    /// Copy of this record moved to `next`; the store assigns the new version.
    pub fn with_status(&self, next: ReservationStatus) -> Self {
        Self {
            status: next,
            ..self.clone()
        }
    }
}
