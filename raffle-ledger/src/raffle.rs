use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    amount::Amount,
    error::{LedgerError, Result},
    number::{TicketNumber, all_numbers},
};

pub type RaffleId = u64;

/// Where buyers send money before submitting proof.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInstructions {
    pub bank: String,
    pub account_id: String,
    pub phone: String,
    pub payee_name: String,
}

/// Stored raffle record. Only one may be active at a time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaffleConfig {
    pub id: RaffleId,
    pub name: String,
    pub draw_date: NaiveDate,
    pub prize_description: String,
    pub ticket_price: Amount,
    pub payment_instructions: PaymentInstructions,
    pub on_sale: BTreeSet<TicketNumber>,
    pub is_active: bool,
}

impl RaffleConfig {
    pub fn from_draft(id: RaffleId, draft: RaffleDraft) -> Self {
        Self {
            id,
            name: draft.name,
            draw_date: draft.draw_date,
            prize_description: draft.prize_description,
            ticket_price: draft.ticket_price,
            payment_instructions: draft.payment_instructions,
            on_sale: draft.on_sale,
            is_active: true,
        }
    }

    pub fn is_on_sale(&self, number: TicketNumber) -> bool {
        self.on_sale.contains(&number)
    }

    pub fn validate(&self) -> Result<()> {
        validate_fields(&self.name, self.ticket_price)
    }
}

/// Admin input for a new raffle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaffleDraft {
    pub name: String,
    pub draw_date: NaiveDate,
    pub prize_description: String,
    pub ticket_price: Amount,
    #[serde(default)]
    pub payment_instructions: PaymentInstructions,
    #[serde(default = "full_board")]
    pub on_sale: BTreeSet<TicketNumber>,
}

impl RaffleDraft {
    pub fn new(name: impl Into<String>, draw_date: NaiveDate, ticket_price: Amount) -> Self {
        Self {
            name: name.into(),
            draw_date,
            prize_description: String::new(),
            ticket_price,
            payment_instructions: PaymentInstructions::default(),
            on_sale: full_board(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_fields(&self.name, self.ticket_price)
    }
}

pub fn full_board() -> BTreeSet<TicketNumber> {
    all_numbers().collect()
}

fn validate_fields(name: &str, ticket_price: Amount) -> Result<()> {
    if name.trim().is_empty() {
        return Err(LedgerError::invalid("raffle name is required"));
    }
    if !ticket_price.is_positive() {
        return Err(LedgerError::invalid(format!(
            "ticket price must be positive, got {ticket_price}"
        )));
    }
    Ok(())
}
