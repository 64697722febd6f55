use crate::{
    contracts::{
        ContractReader,
        ReadFailure,
    },
    events::{
        EventBatch,
        EventSource,
    },
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use fuels::types::Identity;
use std::{
    future::Future,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    time::{
        self,
        MissedTickBehavior,
    },
};
use tracing::{
    debug,
    info,
    warn,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2_000);

/// Source of refresh ticks for the poll worker.
pub trait Ticker: Send {
    fn tick(&mut self) -> impl Future<Output = ()> + Send;
}

pub struct IntervalTicker {
    interval: time::Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

/// One refresh of every dashboard figure. Day-scoped reads are `None` until
/// the current day is known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DashboardReadings {
    pub current_day: Result<u64, ReadFailure>,
    pub total_spin_cost: Result<u64, ReadFailure>,
    pub ticket_price: Result<u64, ReadFailure>,
    pub pool_amount: Result<u64, ReadFailure>,
    pub whitelist: Result<Vec<Identity>, ReadFailure>,
    pub whitelist_size: Result<u64, ReadFailure>,
}

impl DashboardReadings {
    pub fn failures(&self) -> Vec<&ReadFailure> {
        [
            self.current_day.as_ref().err(),
            self.total_spin_cost.as_ref().err(),
            self.ticket_price.as_ref().err(),
            self.pool_amount.as_ref().err(),
            self.whitelist.as_ref().err(),
            self.whitelist_size.as_ref().err(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

pub async fn read_dashboard<R: ContractReader>(reader: &R) -> DashboardReadings {
    let (current_day, total_spin_cost, ticket_price) = futures::join!(
        reader.read_current_day(),
        reader.read_total_spin_cost(),
        reader.read_ticket_price(),
    );
    let (pool_amount, whitelist, whitelist_size) = match current_day {
        Ok(day) => {
            futures::join!(
                reader.read_pool_amount(day),
                reader.read_whitelist(day),
                reader.read_whitelist_size(day),
            )
        }
        Err(_) => (
            Err(ReadFailure::DayUnknown {
                call: "get_pool_amount",
            }),
            Err(ReadFailure::DayUnknown {
                call: "get_whitelist",
            }),
            Err(ReadFailure::DayUnknown {
                call: "get_whitelist_size",
            }),
        ),
    };
    DashboardReadings {
        current_day,
        total_spin_cost,
        ticket_price,
        pool_amount,
        whitelist,
        whitelist_size,
    }
}

/// Bumped on every resubscription. Batches scanned under an older
/// generation belong to the previous cursor and must be dropped.
pub type EventGeneration = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollCommand {
    FetchNow,
    Resubscribe {
        from_block: u32,
        generation: EventGeneration,
    },
    Shutdown,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollEvent {
    Readings(DashboardReadings),
    Events {
        generation: EventGeneration,
        batch: EventBatch,
    },
    EventsFailed(ReadFailure),
}

/// Background worker refreshing reads and scanning for events on every tick
/// or on demand.
pub struct PollScheduler<R, S, K> {
    reader: R,
    source: S,
    ticker: K,
    cursor: u32,
    generation: EventGeneration,
}

impl<R, S, K> PollScheduler<R, S, K>
where
    R: ContractReader + Send + Sync,
    S: EventSource + Send + Sync,
    K: Ticker,
{
    pub fn new(reader: R, source: S, ticker: K, from_block: u32) -> Self {
        Self {
            reader,
            source,
            ticker,
            cursor: from_block,
            generation: 0,
        }
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    async fn poll_once(&mut self, event_tx: &mpsc::UnboundedSender<PollEvent>) -> Result<()> {
        let readings = read_dashboard(&self.reader).await;
        for failure in readings.failures() {
            warn!(error = %failure, "contract read failed");
        }
        event_tx
            .send(PollEvent::Readings(readings))
            .map_err(|_| eyre!("poll receiver dropped"))?;

        let scanned = match self.source.scan_from(self.cursor).await {
            Ok(batch) => {
                debug!(
                    from = self.cursor,
                    next = batch.next_block,
                    found = batch.events.len(),
                    "event scan finished"
                );
                self.cursor = batch.next_block.max(self.cursor);
                PollEvent::Events {
                    generation: self.generation,
                    batch,
                }
            }
            Err(err) => {
                warn!(error = %err, from = self.cursor, "event scan failed");
                PollEvent::EventsFailed(err)
            }
        };
        event_tx
            .send(scanned)
            .map_err(|_| eyre!("poll receiver dropped"))?;
        Ok(())
    }

    pub async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<PollCommand>,
        event_tx: mpsc::UnboundedSender<PollEvent>,
    ) -> Result<()> {
        info!(from_block = self.cursor, "poll worker started");
        loop {
            tokio::select! {
                _ = self.ticker.tick() => {
                    self.poll_once(&event_tx).await?;
                }
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else {
                        break;
                    };
                    match cmd {
                        PollCommand::FetchNow => self.poll_once(&event_tx).await?,
                        PollCommand::Resubscribe {
                            from_block,
                            generation,
                        } => {
                            info!(from_block, generation, "resubscribing event scan");
                            self.cursor = from_block;
                            self.generation = generation;
                            self.poll_once(&event_tx).await?;
                        }
                        PollCommand::Shutdown => break,
                    }
                }
            }
        }
        info!("poll worker stopped");
        Ok(())
    }
}
