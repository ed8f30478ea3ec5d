use std::{collections::BTreeSet, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use log::debug;
use raffle_ledger::{
    Amount, Board, NumberStatus, PaymentInstructions, RaffleConfig, RaffleId, Reservation,
    ReservationId, ReservationLedger, TicketNumber,
};

use crate::error::{Result, ServiceError};

/// What a buyer sees: the active raffle, if any, and the resolved grid.
#[derive(Clone, Debug)]
pub struct RaffleView {
    pub raffle: Option<RaffleConfig>,
    pub board: Board,
}

/// Numbers a buyer has staged locally before checking out. Holds nothing in the ledger.
#[derive(Clone, Debug)]
pub struct Selection {
    raffle_id: RaffleId,
    price: Amount,
    numbers: BTreeSet<TicketNumber>,
}

impl Selection {
    /// Starts an empty selection priced at the raffle's current ticket price.
    pub fn new(raffle: &RaffleConfig) -> Self {
        Self {
            raffle_id: raffle.id,
            price: raffle.ticket_price,
            numbers: BTreeSet::new(),
        }
    }

    /// Adds `number` if the board shows it available, removes it if already staged.
    /// Returns whether the number is selected afterwards.
    pub fn toggle(&mut self, number: TicketNumber, board: &Board) -> Result<bool> {
        if self.numbers.remove(&number) {
            return Ok(false);
        }
        match board.status(number) {
            NumberStatus::Available => {
                self.numbers.insert(number);
                Ok(true)
            }
            status => Err(ServiceError::NumberUnavailable { number, status }),
        }
    }

    pub fn numbers(&self) -> &BTreeSet<TicketNumber> {
        &self.numbers
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    pub fn price(&self) -> Amount {
        self.price
    }

    /// `None` only if the total would overflow.
    pub fn total(&self) -> Option<Amount> {
        self.price.times(self.numbers.len())
    }

    pub fn clear(&mut self) {
        self.numbers.clear();
    }
}

/// Everything the buyer needs to pay for a fresh hold.
#[derive(Clone, Debug)]
pub struct HoldReceipt {
    pub reservation: Reservation,
    pub payment_instructions: PaymentInstructions,
    pub deadline: DateTime<Utc>,
}

impl HoldReceipt {
    pub fn total(&self) -> Amount {
        self.reservation.total_amount
    }
}

pub struct PurchaseFlow {
    ledger: Arc<ReservationLedger>,
}

impl PurchaseFlow {
    pub fn new(ledger: Arc<ReservationLedger>) -> Self {
        Self { ledger }
    }

    pub fn board(&self) -> Result<RaffleView> {
        let raffle = self.ledger.active_raffle()?;
        let board = self.ledger.board()?;
        Ok(RaffleView { raffle, board })
    }

    /// Starts a selection for the active raffle.
    pub fn start_selection(&self) -> Result<Selection> {
        self.ledger
            .active_raffle()?
            .map(|raffle| Selection::new(&raffle))
            .ok_or(ServiceError::NoActiveRaffle)
    }

    /// Places a hold on the staged numbers at the price the buyer saw.
    ///
    /// The selection is cleared only when the hold succeeds, so a conflict leaves
    /// it intact for the buyer to adjust.
    pub fn checkout(&self, selection: &mut Selection) -> Result<HoldReceipt> {
        let raffle = self
            .ledger
            .active_raffle()?
            .ok_or(ServiceError::NoActiveRaffle)?;
        let numbers: Vec<TicketNumber> = selection.numbers.iter().copied().collect();
        let reservation = self
            .ledger
            .create_hold(selection.raffle_id, &numbers, selection.price)?;
        selection.clear();
        debug!(
            "checkout for raffle {} produced reservation {}",
            raffle.id, reservation.id
        );
        Ok(HoldReceipt {
            deadline: reservation.hold_deadline,
            payment_instructions: raffle.payment_instructions,
            reservation,
        })
    }

    /// Advisory time left to pay. `None` once the reservation left `Held`.
    pub fn remaining(&self, id: ReservationId) -> Result<Option<Duration>> {
        let reservation = self.ledger.reservation(id)?;
        Ok(reservation.countdown(self.ledger.now()))
    }

    pub fn submit_proof(
        &self,
        id: ReservationId,
        buyer_name: &str,
        buyer_phone: &str,
        payment_reference: Option<&str>,
    ) -> Result<Reservation> {
        Ok(self
            .ledger
            .submit_payment_proof(id, buyer_name, buyer_phone, payment_reference)?)
    }

    /// Gives up a hold before paying. Submitted purchases can only be changed by the admin.
    pub fn abandon(&self, id: ReservationId) -> Result<Reservation> {
        Ok(self.ledger.release_hold(id)?)
    }
}
