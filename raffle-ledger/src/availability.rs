//! Derived per-number view combining the raffle's on-sale set with live reservations.

use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};

use crate::{
    number::{TicketNumber, all_numbers},
    raffle::{RaffleConfig, RaffleId},
    reservation::{Reservation, ReservationStatus},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberStatus {
    Available,
    Unavailable,
    Locked,
    Sold,
}

impl NumberStatus {
    pub fn label(self) -> &'static str {
        match self {
            NumberStatus::Available => "available",
            NumberStatus::Unavailable => "unavailable",
            NumberStatus::Locked => "locked",
            NumberStatus::Sold => "sold",
        }
    }
}

impl fmt::Display for NumberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Numbers claimed by the live reservations of one raffle.
#[derive(Clone, Debug, Default)]
pub struct Claims {
    sold: BTreeSet<TicketNumber>,
    locked: BTreeSet<TicketNumber>,
}

impl Claims {
    /// Terminal and foreign-raffle reservations are skipped.
    pub fn collect<'a>(
        raffle_id: RaffleId,
        reservations: impl IntoIterator<Item = &'a Reservation>,
    ) -> Self {
        let mut claims = Self::default();
        for reservation in reservations {
            if reservation.raffle_id != raffle_id {
                continue;
            }
            let target = match reservation.status {
                ReservationStatus::Confirmed => &mut claims.sold,
                ReservationStatus::Held | ReservationStatus::PendingConfirmation => {
                    &mut claims.locked
                }
                ReservationStatus::Cancelled | ReservationStatus::Expired => continue,
            };
            target.extend(reservation.numbers.iter().copied());
        }
        claims
    }

    pub fn status(&self, config: &RaffleConfig, number: TicketNumber) -> NumberStatus {
        if self.sold.contains(&number) {
            NumberStatus::Sold
        } else if self.locked.contains(&number) {
            NumberStatus::Locked
        } else if config.is_on_sale(number) {
            NumberStatus::Available
        } else {
            NumberStatus::Unavailable
        }
    }

    /// Requested numbers that are already locked or sold, ascending.
    pub fn conflicts<'a>(
        &self,
        numbers: impl IntoIterator<Item = &'a TicketNumber>,
    ) -> Vec<TicketNumber> {
        let mut taken: Vec<TicketNumber> = numbers
            .into_iter()
            .filter(|n| self.sold.contains(n) || self.locked.contains(n))
            .copied()
            .collect();
        taken.sort();
        taken.dedup();
        taken
    }
}

/// Status of a single number.
pub fn status_of<'a>(
    config: &RaffleConfig,
    reservations: impl IntoIterator<Item = &'a Reservation>,
    number: TicketNumber,
) -> NumberStatus {
    Claims::collect(config.id, reservations).status(config, number)
}

/// Without an active raffle nothing is for sale and nothing is claimed.
pub fn status_without_raffle(_number: TicketNumber) -> NumberStatus {
    NumberStatus::Unavailable
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardEntry {
    pub number: TicketNumber,
    pub status: NumberStatus,
}

/// All 100 numbers with their resolved status, ascending.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub raffle_id: Option<RaffleId>,
    pub entries: Vec<BoardEntry>,
}

impl Board {
    pub fn resolve<'a>(
        config: &RaffleConfig,
        reservations: impl IntoIterator<Item = &'a Reservation>,
    ) -> Self {
        let claims = Claims::collect(config.id, reservations);
        Self {
            raffle_id: Some(config.id),
            entries: all_numbers()
                .map(|number| BoardEntry {
                    number,
                    status: claims.status(config, number),
                })
                .collect(),
        }
    }

    pub fn without_raffle() -> Self {
        Self {
            raffle_id: None,
            entries: all_numbers()
                .map(|number| BoardEntry {
                    number,
                    status: status_without_raffle(number),
                })
                .collect(),
        }
    }

    /// Numbers missing from a partial board (e.g. one deserialized from a
    /// client) resolve as `Unavailable`.
    pub fn status(&self, number: TicketNumber) -> NumberStatus {
        self.entries
            .get(usize::from(number.value()))
            .filter(|entry| entry.number == number)
            .or_else(|| self.entries.iter().find(|entry| entry.number == number))
            .map_or(NumberStatus::Unavailable, |entry| entry.status)
    }

    pub fn numbers_with(&self, status: NumberStatus) -> Vec<TicketNumber> {
        self.entries
            .iter()
            .filter(|entry| entry.status == status)
            .map(|entry| entry.number)
            .collect()
    }

    pub fn summary(&self) -> BoardSummary {
        let mut summary = BoardSummary {
            raffle_id: self.raffle_id,
            ..BoardSummary::default()
        };
        for entry in &self.entries {
            summary.increment(entry.status);
        }
        summary
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoardSummary {
    pub raffle_id: Option<RaffleId>,
    pub available: usize,
    pub unavailable: usize,
    pub locked: usize,
    pub sold: usize,
}

impl BoardSummary {
    fn increment(&mut self, status: NumberStatus) {
        match status {
            NumberStatus::Available => self.available += 1,
            NumberStatus::Unavailable => self.unavailable += 1,
            NumberStatus::Locked => self.locked += 1,
            NumberStatus::Sold => self.sold += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.available + self.unavailable + self.locked + self.sold
    }
}

impl fmt::Display for BoardSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.raffle_id {
            Some(id) => write!(
                f,
                "raffle {id}: available={}, unavailable={}, locked={}, sold={}",
                self.available, self.unavailable, self.locked, self.sold
            ),
            None => write!(f, "no active raffle"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{amount::Amount, raffle::RaffleDraft, reservation::NewHold};
    use chrono::{NaiveDate, Utc};

    fn n(value: &str) -> TicketNumber {
        value.parse().unwrap()
    }

    fn config() -> RaffleConfig {
        let mut draft = RaffleDraft::new(
            "Test",
            NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            Amount::from_units(2),
        );
        draft.on_sale = (0..10).filter_map(TicketNumber::new).collect();
        RaffleConfig::from_draft(1, draft)
    }

    fn reservation(id: u64, raffle_id: u64, numbers: &[&str], status: ReservationStatus) -> Reservation {
        let now = Utc::now();
        Reservation::from_hold(
            id,
            NewHold {
                raffle_id,
                numbers: numbers.iter().map(|v| n(v)).collect(),
                ticket_price: Amount::from_units(2),
                total_amount: Amount::from_units(2),
                created_at: now,
                hold_deadline: now,
            },
        )
        .with_status(status)
    }

    #[test]
    fn derivation_prefers_sold_over_locked() {
        let config = config();
        let reservations = vec![
            reservation(1, 1, &["01"], ReservationStatus::Held),
            reservation(2, 1, &["02"], ReservationStatus::PendingConfirmation),
            reservation(3, 1, &["03"], ReservationStatus::Confirmed),
            reservation(4, 1, &["04"], ReservationStatus::Cancelled),
            reservation(5, 1, &["05"], ReservationStatus::Expired),
        ];
        assert_eq!(status_of(&config, &reservations, n("01")), NumberStatus::Locked);
        assert_eq!(status_of(&config, &reservations, n("02")), NumberStatus::Locked);
        assert_eq!(status_of(&config, &reservations, n("03")), NumberStatus::Sold);
        assert_eq!(status_of(&config, &reservations, n("04")), NumberStatus::Available);
        assert_eq!(status_of(&config, &reservations, n("05")), NumberStatus::Available);
        assert_eq!(status_of(&config, &reservations, n("50")), NumberStatus::Unavailable);
    }

    #[test]
    fn claims_outside_on_sale_still_resolve() {
        let mut config = config();
        let reservations = vec![reservation(1, 1, &["07"], ReservationStatus::Confirmed)];
        config.on_sale.clear();
        assert_eq!(status_of(&config, &reservations, n("07")), NumberStatus::Sold);
        assert_eq!(status_of(&config, &reservations, n("08")), NumberStatus::Unavailable);
    }

    #[test]
    fn ignores_other_raffles() {
        let config = config();
        let reservations = vec![reservation(1, 99, &["01"], ReservationStatus::Confirmed)];
        assert_eq!(status_of(&config, &reservations, n("01")), NumberStatus::Available);
    }

    #[test]
    fn board_summary_counts_every_number() {
        let config = config();
        let reservations = vec![
            reservation(1, 1, &["01", "02"], ReservationStatus::Held),
            reservation(2, 1, &["03"], ReservationStatus::Confirmed),
        ];
        let board = Board::resolve(&config, &reservations);
        let summary = board.summary();
        assert_eq!(summary.total(), 100);
        assert_eq!(summary.locked, 2);
        assert_eq!(summary.sold, 1);
        assert_eq!(summary.available, 7);
        assert_eq!(summary.unavailable, 90);
        assert_eq!(board.numbers_with(NumberStatus::Sold), vec![n("03")]);

        let empty = Board::without_raffle();
        assert_eq!(empty.summary().unavailable, 100);
        assert_eq!(empty.summary().to_string(), "no active raffle");
    }

    #[test]
    fn conflicts_report_taken_numbers_once() {
        let claims = Claims::collect(
            1,
            &[
                reservation(1, 1, &["01"], ReservationStatus::Held),
                reservation(2, 1, &["02"], ReservationStatus::Confirmed),
            ],
        );
        let requested = [n("02"), n("01"), n("03"), n("01")];
        assert_eq!(claims.conflicts(&requested), vec![n("01"), n("02")]);
    }

    #[test]
    fn partial_board_lookup_does_not_panic() {
        let full = Board::resolve(&config(), &Vec::<Reservation>::new());
        let board = Board {
            raffle_id: full.raffle_id,
            entries: full.entries[5..8].to_vec(),
        };
        assert_eq!(board.status(n("06")), NumberStatus::Available);
        assert_eq!(board.status(n("01")), NumberStatus::Unavailable);
        assert_eq!(board.status(n("99")), NumberStatus::Unavailable);
    }
}
