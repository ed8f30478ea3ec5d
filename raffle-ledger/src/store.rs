//! Persistence collaborator for raffle and reservation records.
//!
//! The store owns the uniqueness constraint "one live reservation per number per
//! raffle": [`ReservationStore::insert_hold`] checks and inserts under a single
//! write lock. Status changes go through [`ReservationStore::update_if`], which
//! only applies when both the stored status and version still match.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{
    availability::Claims,
    error::StoreError,
    number::TicketNumber,
    raffle::{RaffleConfig, RaffleDraft, RaffleId},
    reservation::{NewHold, Reservation, ReservationId, ReservationStatus},
};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Status predicate for reservation queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusFilter {
    Any,
    /// Held, pending confirmation or confirmed.
    Live,
    Only(ReservationStatus),
}

impl StatusFilter {
    pub fn matches(self, status: ReservationStatus) -> bool {
        match self {
            StatusFilter::Any => true,
            StatusFilter::Live => status.claims_numbers(),
            StatusFilter::Only(expected) => status == expected,
        }
    }
}

pub trait ReservationStore: Send + Sync {
    fn active_raffle(&self) -> StoreResult<Option<RaffleConfig>>;
    fn raffle(&self, id: RaffleId) -> StoreResult<Option<RaffleConfig>>;
    /// Rejects with [`StoreError::ActiveRaffleExists`] while another raffle is active.
    fn insert_raffle(&self, draft: RaffleDraft) -> StoreResult<RaffleConfig>;
    fn update_raffle(&self, config: RaffleConfig) -> StoreResult<RaffleConfig>;
    /// Deletes the raffle and every reservation that belongs to it. Returns the
    /// number of reservations removed.
    fn delete_raffle(&self, id: RaffleId) -> StoreResult<usize>;

    fn reservation(&self, id: ReservationId) -> StoreResult<Option<Reservation>>;
    /// `raffle_id = None` spans every raffle. Results are ordered by id.
    fn reservations(
        &self,
        raffle_id: Option<RaffleId>,
        filter: StatusFilter,
    ) -> StoreResult<Vec<Reservation>>;
    /// Validates the hold against the raffle as stored and inserts a `Held`
    /// record, all under one write. Rejects with [`StoreError::RaffleInactive`],
    /// [`StoreError::PriceChanged`] or [`StoreError::NumbersOffSale`] when the
    /// raffle moved since the caller read it, and with
    /// [`StoreError::NumbersTaken`] when a live reservation of the same raffle
    /// already claims a requested number.
    fn insert_hold(&self, hold: NewHold) -> StoreResult<Reservation>;
    /// Replaces reservation `next.id` only if it is still in `expected_status`
    /// at `expected_version`. The stored version is bumped.
    fn update_if(
        &self,
        expected_status: ReservationStatus,
        expected_version: u32,
        next: Reservation,
    ) -> StoreResult<Reservation>;
    fn delete_reservation(&self, id: ReservationId) -> StoreResult<Option<Reservation>>;
}

/// Record set shared by the in-memory and file-backed stores.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) struct StoreState {
    next_raffle_id: RaffleId,
    next_reservation_id: ReservationId,
    raffles: BTreeMap<RaffleId, RaffleConfig>,
    reservations: BTreeMap<ReservationId, Reservation>,
}

impl StoreState {
    pub(crate) fn active_raffle(&self) -> Option<RaffleConfig> {
        self.raffles.values().find(|r| r.is_active).cloned()
    }

    pub(crate) fn raffle(&self, id: RaffleId) -> Option<RaffleConfig> {
        self.raffles.get(&id).cloned()
    }

    pub(crate) fn insert_raffle(&mut self, draft: RaffleDraft) -> StoreResult<RaffleConfig> {
        if let Some(active) = self.raffles.values().find(|r| r.is_active) {
            return Err(StoreError::ActiveRaffleExists { id: active.id });
        }
        self.next_raffle_id += 1;
        let config = RaffleConfig::from_draft(self.next_raffle_id, draft);
        self.raffles.insert(config.id, config.clone());
        Ok(config)
    }

    pub(crate) fn update_raffle(&mut self, config: RaffleConfig) -> StoreResult<RaffleConfig> {
        let slot = self
            .raffles
            .get_mut(&config.id)
            .ok_or(StoreError::MissingRaffle { id: config.id })?;
        *slot = config.clone();
        Ok(config)
    }

    pub(crate) fn delete_raffle(&mut self, id: RaffleId) -> StoreResult<usize> {
        if self.raffles.remove(&id).is_none() {
            return Err(StoreError::MissingRaffle { id });
        }
        let before = self.reservations.len();
        self.reservations.retain(|_, r| r.raffle_id != id);
        Ok(before - self.reservations.len())
    }

    pub(crate) fn reservation(&self, id: ReservationId) -> Option<Reservation> {
        self.reservations.get(&id).cloned()
    }

    pub(crate) fn reservations(
        &self,
        raffle_id: Option<RaffleId>,
        filter: StatusFilter,
    ) -> Vec<Reservation> {
        self.reservations
            .values()
            .filter(|r| raffle_id.map_or(true, |id| r.raffle_id == id))
            .filter(|r| filter.matches(r.status))
            .cloned()
            .collect()
    }

    pub(crate) fn insert_hold(&mut self, hold: NewHold) -> StoreResult<Reservation> {
        let raffle = self
            .raffles
            .get(&hold.raffle_id)
            .ok_or(StoreError::MissingRaffle { id: hold.raffle_id })?;
        if !raffle.is_active {
            return Err(StoreError::RaffleInactive { id: raffle.id });
        }
        if raffle.ticket_price != hold.ticket_price {
            return Err(StoreError::PriceChanged {
                id: raffle.id,
                expected: hold.ticket_price,
                actual: raffle.ticket_price,
            });
        }
        let off_sale: Vec<TicketNumber> = hold
            .numbers
            .iter()
            .copied()
            .filter(|n| !raffle.is_on_sale(*n))
            .collect();
        if !off_sale.is_empty() {
            return Err(StoreError::NumbersOffSale { numbers: off_sale });
        }
        let claims = Claims::collect(hold.raffle_id, self.reservations.values());
        let taken = claims.conflicts(&hold.numbers);
        if !taken.is_empty() {
            return Err(StoreError::NumbersTaken { numbers: taken });
        }
        self.next_reservation_id += 1;
        let reservation = Reservation::from_hold(self.next_reservation_id, hold);
        self.reservations
            .insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    pub(crate) fn update_if(
        &mut self,
        expected_status: ReservationStatus,
        expected_version: u32,
        mut next: Reservation,
    ) -> StoreResult<Reservation> {
        let current = self
            .reservations
            .get_mut(&next.id)
            .ok_or(StoreError::MissingReservation { id: next.id })?;
        if current.status != expected_status {
            return Err(StoreError::StatusConflict {
                id: next.id,
                expected: expected_status,
                actual: current.status,
            });
        }
        if current.version != expected_version {
            return Err(StoreError::VersionConflict {
                id: next.id,
                expected: expected_version,
                actual: current.version,
            });
        }
        next.version = current.version.wrapping_add(1);
        *current = next.clone();
        Ok(next)
    }

    pub(crate) fn delete_reservation(&mut self, id: ReservationId) -> Option<Reservation> {
        self.reservations.remove(&id)
    }
}

/// Process-local store guarded by one read/write lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReservationStore for MemoryStore {
    fn active_raffle(&self) -> StoreResult<Option<RaffleConfig>> {
        Ok(self.state.read().active_raffle())
    }

    fn raffle(&self, id: RaffleId) -> StoreResult<Option<RaffleConfig>> {
        Ok(self.state.read().raffle(id))
    }

    fn insert_raffle(&self, draft: RaffleDraft) -> StoreResult<RaffleConfig> {
        self.state.write().insert_raffle(draft)
    }

    fn update_raffle(&self, config: RaffleConfig) -> StoreResult<RaffleConfig> {
        self.state.write().update_raffle(config)
    }

    fn delete_raffle(&self, id: RaffleId) -> StoreResult<usize> {
        self.state.write().delete_raffle(id)
    }

    fn reservation(&self, id: ReservationId) -> StoreResult<Option<Reservation>> {
        Ok(self.state.read().reservation(id))
    }

    fn reservations(
        &self,
        raffle_id: Option<RaffleId>,
        filter: StatusFilter,
    ) -> StoreResult<Vec<Reservation>> {
        Ok(self.state.read().reservations(raffle_id, filter))
    }

    fn insert_hold(&self, hold: NewHold) -> StoreResult<Reservation> {
        self.state.write().insert_hold(hold)
    }

    fn update_if(
        &self,
        expected_status: ReservationStatus,
        expected_version: u32,
        next: Reservation,
    ) -> StoreResult<Reservation> {
        self.state
            .write()
            .update_if(expected_status, expected_version, next)
    }

    fn delete_reservation(&self, id: ReservationId) -> StoreResult<Option<Reservation>> {
        Ok(self.state.write().delete_reservation(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use chrono::{NaiveDate, Utc};

    fn draft() -> RaffleDraft {
        RaffleDraft::new(
            "Store",
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            Amount::from_units(1),
        )
    }

    fn hold(raffle_id: RaffleId, numbers: &[&str]) -> NewHold {
        let now = Utc::now();
        NewHold {
            raffle_id,
            numbers: numbers
                .iter()
                .map(|v| v.parse::<TicketNumber>().unwrap())
                .collect(),
            ticket_price: Amount::from_units(1),
            total_amount: Amount::from_units(numbers.len() as u64),
            created_at: now,
            hold_deadline: now + chrono::Duration::seconds(600),
        }
    }

    #[test]
    fn insert_hold_enforces_number_uniqueness() {
        let store = MemoryStore::new();
        let raffle = store.insert_raffle(draft()).unwrap();
        let first = store.insert_hold(hold(raffle.id, &["03", "04"])).unwrap();
        assert_eq!(first.status, ReservationStatus::Held);

        let err = store.insert_hold(hold(raffle.id, &["04", "05"])).unwrap_err();
        match err {
            StoreError::NumbersTaken { numbers } => {
                assert_eq!(numbers, vec!["04".parse::<TicketNumber>().unwrap()])
            }
            other => panic!("unexpected error {other:?}"),
        }

        store
            .update_if(
                ReservationStatus::Held,
                first.version,
                first.with_status(ReservationStatus::Cancelled),
            )
            .unwrap();
        store.insert_hold(hold(raffle.id, &["04", "05"])).unwrap();
    }

    #[test]
    fn update_if_guards_status_and_version() {
        let store = MemoryStore::new();
        let raffle = store.insert_raffle(draft()).unwrap();
        let held = store.insert_hold(hold(raffle.id, &["10"])).unwrap();

        let pending = store
            .update_if(
                ReservationStatus::Held,
                held.version,
                held.with_status(ReservationStatus::PendingConfirmation),
            )
            .unwrap();
        assert_eq!(pending.version, held.version + 1);

        let stale = store
            .update_if(
                ReservationStatus::Held,
                held.version,
                held.with_status(ReservationStatus::Expired),
            )
            .unwrap_err();
        assert!(matches!(stale, StoreError::StatusConflict { .. }));
        assert!(stale.is_write_conflict());

        let stale_version = store
            .update_if(
                ReservationStatus::PendingConfirmation,
                held.version,
                pending.with_status(ReservationStatus::Confirmed),
            )
            .unwrap_err();
        assert!(matches!(stale_version, StoreError::VersionConflict { .. }));
    }

    #[test]
    fn single_active_raffle_and_cascade_delete() {
        let store = MemoryStore::new();
        let raffle = store.insert_raffle(draft()).unwrap();
        assert!(matches!(
            store.insert_raffle(draft()),
            Err(StoreError::ActiveRaffleExists { .. })
        ));
        store.insert_hold(hold(raffle.id, &["01"])).unwrap();
        store.insert_hold(hold(raffle.id, &["02"])).unwrap();

        assert_eq!(store.delete_raffle(raffle.id).unwrap(), 2);
        assert!(store.active_raffle().unwrap().is_none());
        assert!(store
            .reservations(None, StatusFilter::Any)
            .unwrap()
            .is_empty());
        store.insert_raffle(draft()).unwrap();
    }

    #[test]
    fn filters_by_status() {
        let store = MemoryStore::new();
        let raffle = store.insert_raffle(draft()).unwrap();
        let a = store.insert_hold(hold(raffle.id, &["01"])).unwrap();
        store.insert_hold(hold(raffle.id, &["02"])).unwrap();
        store
            .update_if(
                ReservationStatus::Held,
                a.version,
                a.with_status(ReservationStatus::Expired),
            )
            .unwrap();

        let live = store
            .reservations(Some(raffle.id), StatusFilter::Live)
            .unwrap();
        assert_eq!(live.len(), 1);
        let expired = store
            .reservations(
                Some(raffle.id),
                StatusFilter::Only(ReservationStatus::Expired),
            )
            .unwrap();
        assert_eq!(expired[0].id, a.id);
    }

    #[test]
    fn insert_hold_checks_the_stored_raffle() {
        let store = MemoryStore::new();
        let raffle = store.insert_raffle(draft()).unwrap();

        let mut edited = raffle.clone();
        edited.on_sale.remove(&"05".parse::<TicketNumber>().unwrap());
        store.update_raffle(edited.clone()).unwrap();
        match store.insert_hold(hold(raffle.id, &["04", "05"])).unwrap_err() {
            StoreError::NumbersOffSale { numbers } => {
                assert_eq!(numbers, vec!["05".parse::<TicketNumber>().unwrap()])
            }
            other => panic!("unexpected error {other:?}"),
        }

        edited.ticket_price = Amount::from_units(9);
        store.update_raffle(edited.clone()).unwrap();
        assert!(matches!(
            store.insert_hold(hold(raffle.id, &["04"])),
            Err(StoreError::PriceChanged { .. })
        ));

        edited.ticket_price = Amount::from_units(1);
        edited.is_active = false;
        store.update_raffle(edited).unwrap();
        assert!(matches!(
            store.insert_hold(hold(raffle.id, &["04"])),
            Err(StoreError::RaffleInactive { .. })
        ));
        assert!(store
            .reservations(None, StatusFilter::Any)
            .unwrap()
            .is_empty());
    }
}
