use crate::{
    contracts::{
        FuelContracts,
        ReadFailure,
    },
    lottery_types::WinnerSelected,
    model::{
        SpinRequest,
        SpinResult,
        WinnerEvent,
    },
    roulette_types::{
        SpinCompleted,
        SpinRequested,
    },
    scheduler::Ticker,
};
use fuels::{
    core::codec::LogDecoder,
    programs::calls::ContractDependency,
    prelude::{
        ContractId,
        Provider,
    },
    tx::Receipt,
};
use futures::{
    Stream,
    stream,
};
use std::future::Future;
use tracing::{
    debug,
    warn,
};

pub const DEFAULT_MAX_BLOCKS_PER_SCAN: u32 = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    SpinRequested,
    SpinCompleted,
    WinnerSelected,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContractEvent {
    SpinRequested(SpinRequest),
    SpinCompleted(SpinResult),
    WinnerSelected(WinnerEvent),
}

impl ContractEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ContractEvent::SpinRequested(_) => EventKind::SpinRequested,
            ContractEvent::SpinCompleted(_) => EventKind::SpinCompleted,
            ContractEvent::WinnerSelected(_) => EventKind::WinnerSelected,
        }
    }
}

/// Where a log sits on chain. Ordering follows chain order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventPosition {
    pub block_height: u32,
    pub tx_index: u32,
    pub log_index: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recorded<T> {
    pub position: EventPosition,
    pub event: T,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventBatch {
    pub events: Vec<Recorded<ContractEvent>>,
    /// First block that has not been scanned yet.
    pub next_block: u32,
}

pub trait EventSource {
    /// Scans a bounded range starting at `from_block` and returns every
    /// decoded roulette and lottery event found there, in chain order.
    fn scan_from(
        &self,
        from_block: u32,
    ) -> impl Future<Output = Result<EventBatch, ReadFailure>> + Send;
}

/// An event type an [`EventWatcher`] can be subscribed to.
pub trait WatchedEvent: Clone {
    const KIND: EventKind;

    fn select(event: &ContractEvent) -> Option<&Self>;
}

impl WatchedEvent for SpinRequest {
    const KIND: EventKind = EventKind::SpinRequested;

    fn select(event: &ContractEvent) -> Option<&Self> {
        match event {
            ContractEvent::SpinRequested(request) => Some(request),
            _ => None,
        }
    }
}

impl WatchedEvent for SpinResult {
    const KIND: EventKind = EventKind::SpinCompleted;

    fn select(event: &ContractEvent) -> Option<&Self> {
        match event {
            ContractEvent::SpinCompleted(result) => Some(result),
            _ => None,
        }
    }
}

impl WatchedEvent for WinnerEvent {
    const KIND: EventKind = EventKind::WinnerSelected;

    fn select(event: &ContractEvent) -> Option<&Self> {
        match event {
            ContractEvent::WinnerSelected(winner) => Some(winner),
            _ => None,
        }
    }
}

/// Append-only, chain-ordered log of one event kind, starting at a block.
#[derive(Clone, Debug)]
pub struct EventWatcher<T> {
    from_block: u32,
    log: Vec<Recorded<T>>,
}

pub fn watch_events<T: WatchedEvent>(from_block: u32) -> EventWatcher<T> {
    EventWatcher {
        from_block,
        log: Vec::new(),
    }
}

impl<T: WatchedEvent> EventWatcher<T> {
    pub fn kind(&self) -> EventKind {
        T::KIND
    }

    pub fn from_block(&self) -> u32 {
        self.from_block
    }

    pub fn records(&self) -> &[Recorded<T>] {
        &self.log
    }

    pub fn events(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.log.iter().map(|r| &r.event)
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Appends the matching events of `batch` that lie after the last
    /// recorded position. Overlapping rescans are therefore harmless.
    /// Returns the newly appended records.
    pub fn ingest<'a>(
        &mut self,
        batch: impl IntoIterator<Item = &'a Recorded<ContractEvent>>,
    ) -> &[Recorded<T>] {
        let before = self.log.len();
        for record in batch {
            if record.position.block_height < self.from_block {
                continue;
            }
            let Some(event) = T::select(&record.event) else {
                continue;
            };
            if let Some(last) = self.log.last()
                && record.position <= last.position
            {
                continue;
            }
            self.log.push(Recorded {
                position: record.position,
                event: event.clone(),
            });
        }
        let appended = &self.log[before..];
        if !appended.is_empty() {
            debug!(kind = ?T::KIND, count = appended.len(), "ingested events");
        }
        appended
    }

    pub fn restart(&mut self, from_block: u32) {
        debug!(kind = ?T::KIND, from_block, "restarting event watcher");
        self.from_block = from_block;
        self.log.clear();
    }
}

/// Drives `source` on every tick of `ticker` and yields the watcher's full
/// log after each successful scan. Failed scans are logged and retried on
/// the next tick; the stream never ends on its own.
pub fn watch_events_stream<T, S, K>(
    source: S,
    from_block: u32,
    ticker: K,
) -> impl Stream<Item = Vec<Recorded<T>>>
where
    T: WatchedEvent,
    S: EventSource,
    K: Ticker,
{
    let watcher = watch_events::<T>(from_block);
    stream::unfold(
        (source, watcher, from_block, ticker),
        |(source, mut watcher, mut cursor, mut ticker)| async move {
            loop {
                ticker.tick().await;
                match source.scan_from(cursor).await {
                    Ok(batch) => {
                        cursor = batch.next_block.max(cursor);
                        watcher.ingest(&batch.events);
                        let snapshot = watcher.records().to_vec();
                        return Some((snapshot, (source, watcher, cursor, ticker)));
                    }
                    Err(err) => {
                        warn!(error = %err, kind = ?T::KIND, "event scan failed");
                    }
                }
            }
        },
    )
}

/// Walks blocks through the provider and decodes the logs emitted by the
/// roulette and lottery contracts.
#[derive(Clone)]
pub struct FuelEventSource {
    provider: Provider,
    roulette_id: ContractId,
    lottery_id: ContractId,
    roulette_decoder: LogDecoder,
    lottery_decoder: LogDecoder,
    max_blocks_per_scan: u32,
}

impl FuelEventSource {
    pub fn new(contracts: &FuelContracts, max_blocks_per_scan: u32) -> Self {
        Self {
            provider: contracts.provider().clone(),
            roulette_id: contracts.roulette_id(),
            lottery_id: contracts.lottery_id(),
            roulette_decoder: contracts.roulette().log_decoder(),
            lottery_decoder: contracts.lottery().log_decoder(),
            max_blocks_per_scan: max_blocks_per_scan.max(1),
        }
    }

    fn decode_receipt(&self, receipt: &Receipt) -> Result<Option<ContractEvent>, ReadFailure> {
        let Receipt::LogData { id, .. } = receipt else {
            return Ok(None);
        };
        let single = std::slice::from_ref(receipt);
        if *id == self.roulette_id {
            let requested = self
                .roulette_decoder
                .decode_logs_with_type::<SpinRequested>(single)
                .map_err(|e| ReadFailure::rpc("decode SpinRequested", e))?;
            if let Some(log) = requested.into_iter().next() {
                // height is filled in by the caller
                return Ok(Some(ContractEvent::SpinRequested(SpinRequest::from_log(
                    log, 0,
                ))));
            }
            let completed = self
                .roulette_decoder
                .decode_logs_with_type::<SpinCompleted>(single)
                .map_err(|e| ReadFailure::rpc("decode SpinCompleted", e))?;
            return Ok(completed
                .into_iter()
                .next()
                .map(|log| ContractEvent::SpinCompleted(log.into())));
        }
        if *id == self.lottery_id {
            let winners = self
                .lottery_decoder
                .decode_logs_with_type::<WinnerSelected>(single)
                .map_err(|e| ReadFailure::rpc("decode WinnerSelected", e))?;
            return Ok(winners
                .into_iter()
                .next()
                .map(|log| ContractEvent::WinnerSelected(log.into())));
        }
        Ok(None)
    }
}

/// Decodes the receipts of one transaction. A receipt that fails to decode is
/// logged and skipped so the scan still advances past its block.
fn decode_tx_logs<R>(
    height: u32,
    tx_index: u32,
    receipts: &[R],
    decode: impl Fn(&R) -> Result<Option<ContractEvent>, ReadFailure>,
) -> Vec<Recorded<ContractEvent>> {
    let mut events = Vec::new();
    for (log_index, receipt) in receipts.iter().enumerate() {
        let mut event = match decode(receipt) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(err) => {
                warn!(error = %err, height, tx_index, log_index, "skipping undecodable log");
                continue;
            }
        };
        if let ContractEvent::SpinRequested(request) = &mut event {
            request.requested_block = height;
        }
        events.push(Recorded {
            position: EventPosition {
                block_height: height,
                tx_index,
                log_index: log_index as u32,
            },
            event,
        });
    }
    events
}

impl EventSource for FuelEventSource {
    async fn scan_from(&self, from_block: u32) -> Result<EventBatch, ReadFailure> {
        let latest = self
            .provider
            .latest_block_height()
            .await
            .map_err(|e| ReadFailure::rpc("latest_block_height", e))?;
        if from_block > latest {
            return Ok(EventBatch {
                events: Vec::new(),
                next_block: from_block,
            });
        }
        let last = latest.min(from_block.saturating_add(self.max_blocks_per_scan - 1));

        let mut events = Vec::new();
        for height in from_block..=last {
            let Some(block) = self
                .provider
                .block_by_height(height.into())
                .await
                .map_err(|e| ReadFailure::rpc("block_by_height", e))?
            else {
                continue;
            };
            for (tx_index, tx_id) in block.transactions.iter().enumerate() {
                let receipts = self
                    .provider
                    .tx_status(tx_id)
                    .await
                    .map_err(|e| ReadFailure::rpc("tx_status", e))?
                    .take_receipts();
                events.extend(decode_tx_logs(height, tx_index as u32, &receipts, |r| {
                    self.decode_receipt(r)
                }));
            }
        }
        debug!(from_block, last, found = events.len(), "scanned blocks");
        Ok(EventBatch {
            events,
            next_block: last + 1,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::test_helpers::{
        FakeChain,
        ManualTicker,
        player,
    };
    use futures::StreamExt;

    fn at(block_height: u32, log_index: u32, event: ContractEvent) -> Recorded<ContractEvent> {
        Recorded {
            position: EventPosition {
                block_height,
                tx_index: 0,
                log_index,
            },
            event,
        }
    }

    fn completed(sequence_number: u64) -> ContractEvent {
        ContractEvent::SpinCompleted(SpinResult {
            sequence_number,
            result_index: 0,
            won: false,
            player: player(1),
        })
    }

    #[test]
    fn ingest__keeps_only_the_watched_kind_in_chain_order() {
        // given
        let mut watcher = watch_events::<SpinResult>(0);
        let batch = vec![
            at(1, 0, completed(1)),
            at(
                1,
                1,
                ContractEvent::WinnerSelected(WinnerEvent {
                    day: 1,
                    winner: player(2),
                    prize: 5,
                }),
            ),
            at(2, 0, completed(2)),
        ];

        // when
        let appended = watcher.ingest(&batch).len();

        // then
        assert_eq!(appended, 2);
        assert_eq!(watcher.kind(), EventKind::SpinCompleted);
        let sequences: Vec<u64> = watcher.events().map(|e| e.sequence_number).collect();
        assert_eq!(sequences, vec![1, 2]);
    }

    #[test]
    fn decode_tx_logs__skips_undecodable_logs_and_keeps_the_rest() {
        // given
        let receipts = [0u8, 1, 2, 3];
        let decode = |r: &u8| match r {
            0 => Ok(None),
            1 => Err(ReadFailure::rpc("decode SpinCompleted", "unexpected log id")),
            2 => Ok(Some(ContractEvent::SpinRequested(SpinRequest {
                player: player(1),
                asset_index: 1,
                sequence_number: 4,
                requested_block: 0,
            }))),
            _ => Ok(Some(completed(4))),
        };

        // when
        let events = decode_tx_logs(12, 1, &receipts, decode);

        // then
        let positions: Vec<(u32, u32, u32)> = events
            .iter()
            .map(|r| (r.position.block_height, r.position.tx_index, r.position.log_index))
            .collect();
        assert_eq!(positions, vec![(12, 1, 2), (12, 1, 3)]);
        let ContractEvent::SpinRequested(request) = &events[0].event else {
            panic!("expected a request, got {:?}", events[0].event);
        };
        assert_eq!(request.requested_block, 12);
    }

    #[test]
    fn ingest__ignores_overlapping_rescans() {
        // given
        let mut watcher = watch_events::<SpinResult>(0);
        watcher.ingest(&[at(1, 0, completed(1)), at(2, 0, completed(2))]);

        // when
        let appended = watcher
            .ingest(&[at(2, 0, completed(2)), at(3, 0, completed(3))])
            .len();

        // then
        assert_eq!(appended, 1);
        assert_eq!(watcher.len(), 3);
    }

    #[test]
    fn ingest__skips_events_before_the_starting_block() {
        let mut watcher = watch_events::<SpinResult>(5);
        watcher.ingest(&[at(4, 0, completed(1)), at(5, 0, completed(2))]);
        let sequences: Vec<u64> = watcher.events().map(|e| e.sequence_number).collect();
        assert_eq!(sequences, vec![2]);
    }

    #[test]
    fn restart__clears_the_log_and_moves_the_start() {
        // given
        let mut watcher = watch_events::<SpinResult>(0);
        watcher.ingest(&[at(1, 0, completed(1)), at(8, 0, completed(2))]);

        // when
        watcher.restart(8);
        watcher.ingest(&[at(1, 0, completed(1)), at(8, 0, completed(2))]);

        // then
        assert_eq!(watcher.from_block(), 8);
        assert_eq!(watcher.len(), 1);
    }

    #[tokio::test]
    async fn watch_events_stream__yields_history_then_live_events() {
        // given
        let chain = FakeChain::default();
        chain.push_event(completed(1));
        let (ticker, ticks) = ManualTicker::new();
        let mut stream =
            Box::pin(watch_events_stream::<SpinResult, _, _>(chain.clone(), 0, ticker));

        // when
        ticks.send(()).unwrap();
        let first = stream.next().await.unwrap();
        chain.push_event(completed(2));
        ticks.send(()).unwrap();
        let second = stream.next().await.unwrap();

        // then
        assert_eq!(first.len(), 1);
        let sequences: Vec<u64> = second.iter().map(|r| r.event.sequence_number).collect();
        assert_eq!(sequences, vec![1, 2]);
    }

    #[tokio::test]
    async fn watch_events_stream__survives_failed_scans() {
        // given
        let chain = FakeChain::default();
        chain.push_event(completed(1));
        chain.fail_next_scans(1);
        let (ticker, ticks) = ManualTicker::new();
        let mut stream =
            Box::pin(watch_events_stream::<SpinResult, _, _>(chain.clone(), 0, ticker));

        // when
        ticks.send(()).unwrap();
        ticks.send(()).unwrap();
        let snapshot = stream.next().await.unwrap();

        // then
        assert_eq!(snapshot.len(), 1);
    }
}
