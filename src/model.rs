use crate::{
    asset::Asset,
    lottery_types,
    roulette_types,
};
use fuels::types::Identity;

pub type SequenceNumber = u64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpinRequest {
    pub player: Identity,
    pub asset_index: u8,
    pub sequence_number: SequenceNumber,
    pub requested_block: u32,
}

impl SpinRequest {
    pub fn from_log(log: roulette_types::SpinRequested, requested_block: u32) -> Self {
        Self {
            player: log.player,
            asset_index: log.asset_index,
            sequence_number: log.sequence_number,
            requested_block,
        }
    }

    pub fn guessed_asset(&self) -> Option<Asset> {
        Asset::from_index(self.asset_index)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpinResult {
    pub sequence_number: SequenceNumber,
    pub result_index: u8,
    pub won: bool,
    pub player: Identity,
}

impl SpinResult {
    pub fn resolved_asset(&self) -> Option<Asset> {
        Asset::from_index(self.result_index)
    }
}

impl From<roulette_types::SpinCompleted> for SpinResult {
    fn from(log: roulette_types::SpinCompleted) -> Self {
        Self {
            sequence_number: log.sequence_number,
            result_index: log.result,
            won: log.won,
            player: log.player,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WinnerEvent {
    pub day: u64,
    pub winner: Identity,
    pub prize: u64,
}

impl From<lottery_types::WinnerSelected> for WinnerEvent {
    fn from(log: lottery_types::WinnerSelected) -> Self {
        Self {
            day: log.day,
            winner: log.winner,
            prize: log.prize,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LotteryDayError {
    #[error("winner event for day {event_day} applied to day {day}")]
    DayMismatch { day: u64, event_day: u64 },
    #[error("day {day} already has a winner")]
    AlreadyClosed { day: u64 },
}

/// One day of the lottery as seen from the client. The whitelist keeps
/// duplicates: each roulette win adds one entry.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LotteryDay {
    pub day: u64,
    pub pool_amount: u64,
    pub whitelist: Vec<Identity>,
    pub winner: Option<Identity>,
    pub prize: Option<u64>,
}

impl LotteryDay {
    pub fn open(day: u64, pool_amount: u64, whitelist: Vec<Identity>) -> Self {
        Self {
            day,
            pool_amount,
            whitelist,
            winner: None,
            prize: None,
        }
    }

    pub fn entries_for(&self, player: &Identity) -> usize {
        self.whitelist.iter().filter(|entry| *entry == player).count()
    }

    pub fn is_closed(&self) -> bool {
        self.winner.is_some()
    }

    pub fn close(&mut self, event: &WinnerEvent) -> Result<(), LotteryDayError> {
        if event.day != self.day {
            return Err(LotteryDayError::DayMismatch {
                day: self.day,
                event_day: event.day,
            });
        }
        if self.is_closed() {
            return Err(LotteryDayError::AlreadyClosed { day: self.day });
        }
        self.winner = Some(event.winner);
        self.prize = Some(event.prize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use fuels::types::Address;

    fn player(byte: u8) -> Identity {
        Identity::Address(Address::from([byte; 32]))
    }

    #[test]
    fn entries_for__counts_every_occurrence_of_the_player() {
        // given
        let alice = player(1);
        let bob = player(2);
        let day = LotteryDay::open(
            4,
            1_000,
            vec![alice, bob, alice, alice],
        );

        // when
        let entries = day.entries_for(&alice);

        // then
        assert_eq!(entries, 3);
        assert_eq!(day.entries_for(&bob), 1);
        assert_eq!(day.entries_for(&player(3)), 0);
    }

    #[test]
    fn close__records_winner_exactly_once() {
        // given
        let mut day = LotteryDay::open(3, 2_500_000_000, vec![player(1)]);
        let event = WinnerEvent {
            day: 3,
            winner: player(1),
            prize: 2_500_000_000,
        };

        // when
        day.close(&event).unwrap();
        let second = day.close(&event);

        // then
        assert_eq!(day.winner, Some(player(1)));
        assert_eq!(day.prize, Some(2_500_000_000));
        assert_eq!(second, Err(LotteryDayError::AlreadyClosed { day: 3 }));
    }

    #[test]
    fn close__rejects_event_for_another_day() {
        let mut day = LotteryDay::open(3, 0, Vec::new());
        let event = WinnerEvent {
            day: 2,
            winner: player(9),
            prize: 1,
        };
        assert_eq!(
            day.close(&event),
            Err(LotteryDayError::DayMismatch {
                day: 3,
                event_day: 2
            })
        );
        assert!(!day.is_closed());
    }

    #[test]
    fn spin_result__maps_result_index_to_asset() {
        let log = roulette_types::SpinCompleted {
            sequence_number: 7,
            result: 1,
            won: true,
            player: player(5),
        };
        let result = SpinResult::from(log);
        assert_eq!(result.resolved_asset(), Some(Asset::Eth));
        assert!(result.won);
    }
}
