use std::{collections::BTreeSet, sync::Arc};

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::{
    amount::Amount,
    availability::{Board, NumberStatus},
    clock::{Clock, SystemClock},
    config::LedgerConfig,
    error::{LedgerError, Result, StoreError},
    file_store::JsonFileStore,
    number::{TicketNumber, format_numbers},
    raffle::{RaffleConfig, RaffleDraft, RaffleId},
    reservation::{BuyerDetails, NewHold, Reservation, ReservationId, ReservationStatus},
    store::{MemoryStore, ReservationStore, StatusFilter},
};

/// Guarded updates that lose a race are retried against a fresh read this many times.
const MAX_TRANSITION_ATTEMPTS: usize = 3;

/// Owns the reservation lifecycle for the active raffle.
///
/// All state lives in the [`ReservationStore`]; the ledger only validates input,
/// applies the transition table and turns store failures into [`LedgerError`]s.
pub struct ReservationLedger {
    config: LedgerConfig,
    store: Arc<dyn ReservationStore>,
    clock: Arc<dyn Clock>,
}

impl ReservationLedger {
    pub fn new(config: LedgerConfig, store: Arc<dyn ReservationStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            store,
            clock,
        }
    }

    /// Opens the json store under `state_dir`, or an in-memory store when unset.
    pub fn bootstrap(config: LedgerConfig) -> Result<Self> {
        config.ensure_dirs()?;
        let store: Arc<dyn ReservationStore> = match config.store_path() {
            Some(path) => Arc::new(JsonFileStore::load_or_init(path)?),
            None => Arc::new(MemoryStore::new()),
        };
        Ok(Self::new(config, store, Arc::new(SystemClock)))
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn ReservationStore> {
        Arc::clone(&self.store)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ---- raffle records ----

    pub fn active_raffle(&self) -> Result<Option<RaffleConfig>> {
        Ok(self.store.active_raffle()?)
    }

    pub fn require_active_raffle(&self) -> Result<RaffleConfig> {
        self.active_raffle()?
            .ok_or_else(|| LedgerError::invalid("no active raffle"))
    }

    pub fn create_raffle(&self, draft: RaffleDraft) -> Result<RaffleConfig> {
        draft.validate()?;
        let config = self.store.insert_raffle(draft).map_err(|err| match err {
            StoreError::ActiveRaffleExists { id } => LedgerError::invalid(format!(
                "raffle {id} is still active; reset it before creating another"
            )),
            other => other.into(),
        })?;
        info!(
            "raffle {} '{}' created at {} per number",
            config.id, config.name, config.ticket_price
        );
        Ok(config)
    }

    /// Applies `edit` to the stored raffle and persists it if it still validates.
    pub fn update_raffle(
        &self,
        raffle_id: RaffleId,
        edit: impl FnOnce(&mut RaffleConfig),
    ) -> Result<RaffleConfig> {
        let mut config = self
            .store
            .raffle(raffle_id)?
            .ok_or_else(|| LedgerError::invalid(format!("raffle {raffle_id} does not exist")))?;
        edit(&mut config);
        config.id = raffle_id;
        config.validate()?;
        Ok(self.store.update_raffle(config)?)
    }

    /// Deletes the raffle and all of its reservations.
    pub fn reset_raffle(&self, raffle_id: RaffleId) -> Result<usize> {
        let removed = self.store.delete_raffle(raffle_id).map_err(|err| match err {
            StoreError::MissingRaffle { id } => {
                LedgerError::invalid(format!("raffle {id} does not exist"))
            }
            other => other.into(),
        })?;
        warn!("raffle {raffle_id} reset; {removed} reservations removed");
        Ok(removed)
    }

    // ---- reservation lifecycle ----

    pub fn create_hold(
        &self,
        raffle_id: RaffleId,
        numbers: &[TicketNumber],
        price_at_time: Amount,
    ) -> Result<Reservation> {
        if numbers.is_empty() {
            return Err(LedgerError::invalid("select at least one number"));
        }
        let requested: BTreeSet<TicketNumber> = numbers.iter().copied().collect();
        if requested.len() != numbers.len() {
            return Err(LedgerError::invalid("numbers must not repeat"));
        }
        let total_amount = price_at_time
            .times(requested.len())
            .ok_or_else(|| LedgerError::invalid("total amount overflows"))?;

        // raffle state (active, price, on-sale set) is checked by the store
        // inside the same write as the uniqueness check
        let created_at = self.now();
        let hold = NewHold {
            raffle_id,
            numbers: requested,
            ticket_price: price_at_time,
            total_amount,
            created_at,
            hold_deadline: created_at + self.config.hold_window(),
        };
        let reservation = self.store.insert_hold(hold).map_err(|err| match err {
            StoreError::NumbersTaken { numbers } => LedgerError::Conflict { numbers },
            StoreError::MissingRaffle { id } | StoreError::RaffleInactive { id } => {
                LedgerError::invalid(format!("raffle {id} is not active"))
            }
            StoreError::PriceChanged {
                expected, actual, ..
            } => LedgerError::invalid(format!(
                "ticket price changed from {expected} to {actual}"
            )),
            StoreError::NumbersOffSale { numbers } => LedgerError::invalid(format!(
                "numbers not on sale: {}",
                format_numbers(&numbers)
            )),
            other => other.into(),
        })?;
        info!(
            "reservation {} holds [{}] for {} until {}",
            reservation.id,
            format_numbers(&reservation.numbers),
            reservation.total_amount,
            reservation.hold_deadline
        );
        Ok(reservation)
    }

    pub fn submit_payment_proof(
        &self,
        id: ReservationId,
        buyer_name: &str,
        buyer_phone: &str,
        payment_reference: Option<&str>,
    ) -> Result<Reservation> {
        let buyer_name = buyer_name.trim();
        let buyer_phone = buyer_phone.trim();
        if buyer_name.is_empty() || buyer_phone.is_empty() {
            return Err(LedgerError::invalid("buyer name and phone are required"));
        }
        let buyer = BuyerDetails {
            name: buyer_name.to_string(),
            phone: buyer_phone.to_string(),
            payment_reference: payment_reference
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string),
        };

        let mut last_conflict = None;
        for _ in 0..MAX_TRANSITION_ATTEMPTS {
            let current = self.reservation(id)?;
            match current.status {
                ReservationStatus::Held => {}
                ReservationStatus::Expired => {
                    return Err(LedgerError::Expired {
                        id,
                        deadline: current.hold_deadline,
                    });
                }
                status => {
                    return Err(LedgerError::InvalidState {
                        id,
                        status,
                        operation: "submit payment for",
                    });
                }
            }
            if current.is_past_deadline(self.now()) {
                if self.expire(&current)? {
                    return Err(LedgerError::Expired {
                        id,
                        deadline: current.hold_deadline,
                    });
                }
                continue;
            }
            let mut next = current.with_status(ReservationStatus::PendingConfirmation);
            next.buyer = Some(buyer.clone());
            match self
                .store
                .update_if(current.status, current.version, next)
            {
                Ok(updated) => {
                    info!(
                        "reservation {id} awaiting confirmation (buyer '{}')",
                        buyer.name
                    );
                    return Ok(updated);
                }
                Err(err) if err.is_write_conflict() => last_conflict = Some(err),
                Err(StoreError::MissingReservation { .. }) => {
                    return Err(LedgerError::NotFound { id });
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(self.contention(id, last_conflict))
    }

    pub fn confirm(&self, id: ReservationId) -> Result<Reservation> {
        let confirmed = self.transition(id, "confirm", None, ReservationStatus::Confirmed)?;
        info!(
            "reservation {id} confirmed; [{}] sold",
            format_numbers(&confirmed.numbers)
        );
        Ok(confirmed)
    }

    pub fn cancel(&self, id: ReservationId) -> Result<Reservation> {
        let cancelled = self.transition(id, "cancel", None, ReservationStatus::Cancelled)?;
        info!(
            "reservation {id} cancelled; [{}] released",
            format_numbers(&cancelled.numbers)
        );
        Ok(cancelled)
    }

    /// Buyer-side cancel: only succeeds while the reservation is still `Held`.
    pub fn release_hold(&self, id: ReservationId) -> Result<Reservation> {
        let released = self.transition(
            id,
            "release",
            Some(ReservationStatus::Held),
            ReservationStatus::Cancelled,
        )?;
        info!(
            "reservation {id} released by buyer; [{}] available again",
            format_numbers(&released.numbers)
        );
        Ok(released)
    }

    /// Removes the reservation whatever its status. Returns false if it was already gone.
    pub fn unblock(&self, id: ReservationId) -> Result<bool> {
        match self.store.delete_reservation(id)? {
            Some(removed) => {
                warn!(
                    "reservation {id} ({}) unblocked; [{}] released",
                    removed.status,
                    format_numbers(&removed.numbers)
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Moves every `Held` reservation whose deadline is before `now` to `Expired`.
    ///
    /// Records changed by a concurrent writer between the read and the guarded
    /// update are left alone.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let held = self
            .store
            .reservations(None, StatusFilter::Only(ReservationStatus::Held))?;
        let mut expired = 0;
        for reservation in held.iter().filter(|r| r.hold_deadline < now) {
            if self.expire(reservation)? {
                expired += 1;
            }
        }
        if expired > 0 {
            info!("expired {expired} stale holds");
        }
        Ok(expired)
    }

    // ---- reads ----

    pub fn reservation(&self, id: ReservationId) -> Result<Reservation> {
        self.store
            .reservation(id)?
            .ok_or(LedgerError::NotFound { id })
    }

    pub fn reservations(
        &self,
        raffle_id: Option<RaffleId>,
        filter: StatusFilter,
    ) -> Result<Vec<Reservation>> {
        Ok(self.store.reservations(raffle_id, filter)?)
    }

    pub fn active_reservations(&self, raffle_id: RaffleId) -> Result<Vec<Reservation>> {
        self.reservations(Some(raffle_id), StatusFilter::Live)
    }

    /// Resolved grid for the active raffle, or an all-unavailable grid without one.
    pub fn board(&self) -> Result<Board> {
        match self.active_raffle()? {
            Some(raffle) => {
                let live = self.active_reservations(raffle.id)?;
                Ok(Board::resolve(&raffle, &live))
            }
            None => Ok(Board::without_raffle()),
        }
    }

    pub fn status_of(&self, number: TicketNumber) -> Result<NumberStatus> {
        Ok(self.board()?.status(number))
    }

    // ---- internals ----

    fn transition(
        &self,
        id: ReservationId,
        operation: &'static str,
        required: Option<ReservationStatus>,
        next_status: ReservationStatus,
    ) -> Result<Reservation> {
        let mut last_conflict = None;
        for _ in 0..MAX_TRANSITION_ATTEMPTS {
            let current = self.reservation(id)?;
            let allowed = required.map_or(true, |status| status == current.status)
                && current.status.can_transition_to(next_status);
            if !allowed {
                return Err(LedgerError::InvalidState {
                    id,
                    status: current.status,
                    operation,
                });
            }
            match self.store.update_if(
                current.status,
                current.version,
                current.with_status(next_status),
            ) {
                Ok(updated) => return Ok(updated),
                Err(err) if err.is_write_conflict() => last_conflict = Some(err),
                Err(StoreError::MissingReservation { .. }) => {
                    return Err(LedgerError::NotFound { id });
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(self.contention(id, last_conflict))
    }

    /// Guarded `Held -> Expired`. Returns false when another writer got there first.
    fn expire(&self, reservation: &Reservation) -> Result<bool> {
        match self.store.update_if(
            ReservationStatus::Held,
            reservation.version,
            reservation.with_status(ReservationStatus::Expired),
        ) {
            Ok(_) => {
                info!(
                    "reservation {} expired; [{}] released",
                    reservation.id,
                    format_numbers(&reservation.numbers)
                );
                Ok(true)
            }
            Err(err) if err.is_write_conflict() => Ok(false),
            Err(StoreError::MissingReservation { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn contention(&self, id: ReservationId, last_conflict: Option<StoreError>) -> LedgerError {
        warn!("reservation {id} changed underneath {MAX_TRANSITION_ATTEMPTS} guarded updates");
        match last_conflict {
            Some(err) => LedgerError::Infrastructure(err),
            None => LedgerError::NotFound { id },
        }
    }
}
