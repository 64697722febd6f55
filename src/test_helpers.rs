//! In-memory stand-ins for the chain, used by unit and integration tests.

use crate::{
    asset::Asset,
    contracts::{
        ContractReader,
        ContractWriter,
        ReadFailure,
        SpinReceipt,
        WriteFailure,
    },
    events::{
        ContractEvent,
        EventBatch,
        EventPosition,
        EventSource,
        Recorded,
    },
    model::{
        SequenceNumber,
        SpinRequest,
        SpinResult,
        WinnerEvent,
    },
    scheduler::Ticker,
};
use fuels::types::{
    Address,
    Identity,
};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
    },
};
use tokio::sync::mpsc;

pub fn player(byte: u8) -> Identity {
    Identity::Address(Address::from([byte; 32]))
}

#[derive(Default)]
struct ChainState {
    current_day: u64,
    total_spin_cost: u64,
    ticket_price: u64,
    pools: HashMap<u64, u64>,
    whitelists: HashMap<u64, Vec<Identity>>,
    // one event per block, block height = index + 1
    events: Vec<ContractEvent>,
    next_sequence: SequenceNumber,
    fail_reads: bool,
    failing_scans: usize,
    reject_spins: Option<WriteFailure>,
    omit_receipt_logs: bool,
    spins: Vec<(Identity, Asset, u64)>,
}

/// A fake roulette + lottery deployment. Clones share state.
#[derive(Clone, Default)]
pub struct FakeChain {
    caller: Option<Identity>,
    state: Arc<Mutex<ChainState>>,
}

impl FakeChain {
    /// A handle that submits spins as `caller`.
    pub fn as_caller(&self, caller: Identity) -> Self {
        Self {
            caller: Some(caller),
            state: Arc::clone(&self.state),
        }
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap()
    }

    pub fn set_current_day(&self, day: u64) {
        self.state().current_day = day;
    }

    pub fn set_spin_cost(&self, cost: u64) {
        self.state().total_spin_cost = cost;
    }

    pub fn set_ticket_price(&self, price: u64) {
        self.state().ticket_price = price;
    }

    pub fn set_pool(&self, day: u64, amount: u64) {
        self.state().pools.insert(day, amount);
    }

    pub fn add_to_whitelist(&self, day: u64, who: Identity) {
        self.state().whitelists.entry(day).or_default().push(who);
    }

    pub fn set_next_sequence(&self, sequence: SequenceNumber) {
        self.state().next_sequence = sequence;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state().fail_reads = fail;
    }

    pub fn fail_next_scans(&self, count: usize) {
        self.state().failing_scans = count;
    }

    pub fn reject_spins(&self, failure: WriteFailure) {
        self.state().reject_spins = Some(failure);
    }

    /// Spins succeed but their receipts carry no request log.
    pub fn omit_receipt_logs(&self) {
        self.state().omit_receipt_logs = true;
    }

    /// Appends `event` in a new block and returns that block's height.
    pub fn push_event(&self, event: ContractEvent) -> u32 {
        let mut state = self.state();
        state.events.push(event);
        state.events.len() as u32
    }

    pub fn head(&self) -> u32 {
        self.state().events.len() as u32
    }

    pub fn spins(&self) -> Vec<(Identity, Asset, u64)> {
        self.state().spins.clone()
    }

    /// Oracle callback: completes `sequence`, whitelisting the player for the
    /// current day when they won.
    pub fn complete_spin(&self, sequence: SequenceNumber, result: Asset, won: bool) -> u32 {
        let (player, day) = {
            let state = self.state();
            let player = state
                .events
                .iter()
                .find_map(|e| match e {
                    ContractEvent::SpinRequested(r) if r.sequence_number == sequence => {
                        Some(r.player)
                    }
                    _ => None,
                })
                .unwrap_or_else(|| panic!("no request for sequence {sequence}"));
            (player, state.current_day)
        };
        if won {
            self.add_to_whitelist(day, player);
        }
        self.push_event(ContractEvent::SpinCompleted(SpinResult {
            sequence_number: sequence,
            result_index: result.index(),
            won,
            player,
        }))
    }

    pub fn select_winner(&self, day: u64, winner: Identity, prize: u64) -> u32 {
        self.push_event(ContractEvent::WinnerSelected(WinnerEvent {
            day,
            winner,
            prize,
        }))
    }

    fn read<T>(&self, call: &'static str, f: impl FnOnce(&ChainState) -> T) -> Result<T, ReadFailure> {
        let state = self.state();
        if state.fail_reads {
            return Err(ReadFailure::rpc(call, "connection refused"));
        }
        Ok(f(&state))
    }
}

impl ContractReader for FakeChain {
    async fn read_current_day(&self) -> Result<u64, ReadFailure> {
        self.read("get_current_day", |s| s.current_day)
    }

    async fn read_pool_amount(&self, day: u64) -> Result<u64, ReadFailure> {
        self.read("get_pool_amount", |s| {
            s.pools.get(&day).copied().unwrap_or_default()
        })
    }

    async fn read_whitelist(&self, day: u64) -> Result<Vec<Identity>, ReadFailure> {
        self.read("get_whitelist", |s| {
            s.whitelists.get(&day).cloned().unwrap_or_default()
        })
    }

    async fn read_whitelist_size(&self, day: u64) -> Result<u64, ReadFailure> {
        self.read("get_whitelist_size", |s| {
            s.whitelists.get(&day).map_or(0, |w| w.len() as u64)
        })
    }

    async fn read_ticket_price(&self) -> Result<u64, ReadFailure> {
        self.read("ticket_price", |s| s.ticket_price)
    }

    async fn read_total_spin_cost(&self) -> Result<u64, ReadFailure> {
        self.read("get_total_spin_cost", |s| s.total_spin_cost)
    }
}

impl ContractWriter for FakeChain {
    async fn spin_roulette(
        &self,
        asset: Asset,
        value: u64,
    ) -> Result<SpinReceipt, WriteFailure> {
        let caller = self
            .caller
            .ok_or_else(|| WriteFailure::Rejected("no signer".to_string()))?;
        let mut state = self.state();
        if let Some(failure) = state.reject_spins.clone() {
            return Err(failure);
        }
        if value < state.total_spin_cost {
            return Err(WriteFailure::Reverted("InsufficientPayment".to_string()));
        }
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.spins.push((caller, asset, value));
        let block = state.events.len() as u32 + 1;
        let request = SpinRequest {
            player: caller,
            asset_index: asset.index(),
            sequence_number: sequence,
            requested_block: block,
        };
        state.events.push(ContractEvent::SpinRequested(request.clone()));
        let requests = if state.omit_receipt_logs {
            Vec::new()
        } else {
            vec![request]
        };
        Ok(SpinReceipt {
            requests,
            block_height: block,
        })
    }
}

impl EventSource for FakeChain {
    async fn scan_from(&self, from_block: u32) -> Result<EventBatch, ReadFailure> {
        let mut state = self.state();
        if state.failing_scans > 0 {
            state.failing_scans -= 1;
            return Err(ReadFailure::rpc("block_by_height", "node unavailable"));
        }
        let head = state.events.len() as u32;
        let events = state
            .events
            .iter()
            .enumerate()
            .map(|(i, event)| Recorded {
                position: EventPosition {
                    block_height: i as u32 + 1,
                    tx_index: 0,
                    log_index: 0,
                },
                event: event.clone(),
            })
            .filter(|r| r.position.block_height >= from_block)
            .collect();
        Ok(EventBatch {
            events,
            next_block: from_block.max(head + 1),
        })
    }
}

/// Ticks only when the test sends on the paired channel.
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<()>,
}

impl ManualTicker {
    pub fn new() -> (Self, mpsc::UnboundedSender<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, tx)
    }
}

impl Ticker for ManualTicker {
    async fn tick(&mut self) {
        if self.rx.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}
