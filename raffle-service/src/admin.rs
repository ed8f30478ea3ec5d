use std::{collections::BTreeSet, sync::Arc};

use chrono::NaiveDate;
use log::info;
use raffle_ledger::{
    Amount, Board, PaymentInstructions, RaffleConfig, RaffleDraft, Reservation, ReservationId,
    ReservationLedger, StatusFilter, TicketNumber, number::all_numbers,
};

use crate::{
    auth::{AuthService, Session},
    error::{Result, ServiceError},
};

/// Organizer operations. Every call must carry a live admin session token.
pub struct AdminConsole {
    ledger: Arc<ReservationLedger>,
    auth: Arc<dyn AuthService>,
}

impl AdminConsole {
    pub fn new(ledger: Arc<ReservationLedger>, auth: Arc<dyn AuthService>) -> Self {
        Self { ledger, auth }
    }

    fn authorize(&self, token: &str) -> Result<Session> {
        self.auth
            .current_session(token)
            .ok_or(ServiceError::Unauthorized)
    }

    fn active(&self) -> Result<RaffleConfig> {
        self.ledger
            .active_raffle()?
            .ok_or(ServiceError::NoActiveRaffle)
    }

    fn edit_active(
        &self,
        token: &str,
        edit: impl FnOnce(&mut RaffleConfig),
    ) -> Result<RaffleConfig> {
        let session = self.authorize(token)?;
        let raffle = self.active()?;
        let updated = self.ledger.update_raffle(raffle.id, edit)?;
        info!("raffle {} updated by '{}'", updated.id, session.username);
        Ok(updated)
    }

    // ---- configuration tab ----

    pub fn raffle(&self, token: &str) -> Result<RaffleConfig> {
        self.authorize(token)?;
        self.active()
    }

    pub fn create_raffle(&self, token: &str, draft: RaffleDraft) -> Result<RaffleConfig> {
        self.authorize(token)?;
        Ok(self.ledger.create_raffle(draft)?)
    }

    pub fn update_details(
        &self,
        token: &str,
        name: &str,
        draw_date: NaiveDate,
        prize_description: &str,
    ) -> Result<RaffleConfig> {
        self.edit_active(token, |raffle| {
            raffle.name = name.trim().to_string();
            raffle.draw_date = draw_date;
            raffle.prize_description = prize_description.trim().to_string();
        })
    }

    /// New price applies to holds created afterwards; existing totals are fixed.
    pub fn set_price(&self, token: &str, ticket_price: Amount) -> Result<RaffleConfig> {
        self.edit_active(token, |raffle| raffle.ticket_price = ticket_price)
    }

    pub fn set_payment_instructions(
        &self,
        token: &str,
        instructions: PaymentInstructions,
    ) -> Result<RaffleConfig> {
        self.edit_active(token, |raffle| raffle.payment_instructions = instructions)
    }

    // ---- numbers tab ----
    // Curation never touches existing reservations.

    /// Flips one number in or out of sale. Returns whether it is on sale afterwards.
    pub fn toggle_on_sale(&self, token: &str, number: TicketNumber) -> Result<bool> {
        let updated = self.edit_active(token, |raffle| {
            if !raffle.on_sale.remove(&number) {
                raffle.on_sale.insert(number);
            }
        })?;
        Ok(updated.is_on_sale(number))
    }

    pub fn set_on_sale(
        &self,
        token: &str,
        numbers: BTreeSet<TicketNumber>,
    ) -> Result<RaffleConfig> {
        self.edit_active(token, |raffle| raffle.on_sale = numbers)
    }

    pub fn select_all(&self, token: &str) -> Result<RaffleConfig> {
        self.set_on_sale(token, all_numbers().collect())
    }

    pub fn clear_all(&self, token: &str) -> Result<RaffleConfig> {
        self.set_on_sale(token, BTreeSet::new())
    }

    pub fn board(&self, token: &str) -> Result<Board> {
        self.authorize(token)?;
        Ok(self.ledger.board()?)
    }

    // ---- purchases tab ----

    /// Reservations of the active raffle matching `filter`, ordered by id.
    pub fn purchases(&self, token: &str, filter: StatusFilter) -> Result<Vec<Reservation>> {
        self.authorize(token)?;
        match self.ledger.active_raffle()? {
            Some(raffle) => Ok(self.ledger.reservations(Some(raffle.id), filter)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn confirm(&self, token: &str, id: ReservationId) -> Result<Reservation> {
        let session = self.authorize(token)?;
        let confirmed = self.ledger.confirm(id)?;
        info!("'{}' confirmed reservation {id}", session.username);
        Ok(confirmed)
    }

    pub fn cancel(&self, token: &str, id: ReservationId) -> Result<Reservation> {
        let session = self.authorize(token)?;
        let cancelled = self.ledger.cancel(id)?;
        info!("'{}' cancelled reservation {id}", session.username);
        Ok(cancelled)
    }

    /// Deletes the reservation outright. Returns false if it was already gone.
    pub fn unblock(&self, token: &str, id: ReservationId) -> Result<bool> {
        self.authorize(token)?;
        Ok(self.ledger.unblock(id)?)
    }

    pub fn sweep_now(&self, token: &str) -> Result<usize> {
        self.authorize(token)?;
        Ok(self.ledger.sweep_expired(self.ledger.now())?)
    }

    /// Deletes the active raffle and all of its reservations.
    pub fn reset_raffle(&self, token: &str) -> Result<usize> {
        let session = self.authorize(token)?;
        let raffle = self.active()?;
        let removed = self.ledger.reset_raffle(raffle.id)?;
        info!(
            "'{}' reset raffle {} ({removed} reservations removed)",
            session.username, raffle.id
        );
        Ok(removed)
    }
}
