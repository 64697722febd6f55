use crate::{
    asset::Asset,
    contracts::{
        ReadFailure,
        SpinReceipt,
        WriteFailure,
    },
    correlator::{
        CorrelationUpdate,
        DEFAULT_SPIN_TIMEOUT,
        SpinCorrelator,
        SpinPhase,
        SpinRejected,
        Ticket,
    },
    events::{
        ContractEvent,
        EventBatch,
        EventWatcher,
        watch_events,
    },
    model::{
        LotteryDay,
        SpinRequest,
        SpinResult,
        WinnerEvent,
    },
    scheduler::{
        DashboardReadings,
        EventGeneration,
    },
    session::SessionContext,
    view::{
        self,
        ResultBanner,
        SpinRow,
        WinnerRow,
    },
};
use fuels::types::Identity;
use std::time::Duration;
use tracing::{
    debug,
    error,
    info,
    warn,
};

const MAX_ERRORS: usize = 5;

#[derive(Clone, Copy, Debug)]
pub struct ControllerConfig {
    pub from_block: u32,
    pub spin_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            from_block: 0,
            spin_timeout: DEFAULT_SPIN_TIMEOUT,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Page {
    #[default]
    Roulette,
    Lottery,
}

impl Page {
    pub fn toggled(self) -> Self {
        match self {
            Page::Roulette => Page::Lottery,
            Page::Lottery => Page::Roulette,
        }
    }
}

/// Last successful value of each read; `None` while unknown or failing.
#[derive(Clone, Debug, Default)]
struct Dashboard {
    current_day: Option<u64>,
    total_spin_cost: Option<u64>,
    ticket_price: Option<u64>,
    pool_amount: Option<u64>,
    whitelist: Option<Vec<Identity>>,
    whitelist_size: Option<u64>,
}

/// What the run loop must submit for a spin that was accepted locally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpinOrder {
    pub ticket: Ticket,
    pub asset: Asset,
    pub value: u64,
}

#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub page: Page,
    pub network: String,
    pub player: Option<String>,
    pub player_short: Option<String>,
    pub current_day: String,
    pub spin_cost: String,
    pub ticket_price: String,
    pub pool: String,
    pub total_entries: String,
    pub your_entries: usize,
    pub eligibility: &'static str,
    pub entries_hint: &'static str,
    pub today_winner: Option<String>,
    pub selected_asset: Option<Asset>,
    pub wheel: Option<Asset>,
    pub spin_label: &'static str,
    pub spinning: bool,
    pub banner: Option<ResultBanner>,
    pub recent_spins: Vec<SpinRow>,
    pub recent_winners: Vec<WinnerRow>,
    pub status: String,
    pub read_warning: Option<String>,
    pub errors: Vec<String>,
}

pub struct AppController {
    session: SessionContext,
    spin_timeout: Duration,
    correlator: SpinCorrelator,
    selected_asset: Option<Asset>,
    page: Page,
    dashboard: Dashboard,
    requests: EventWatcher<SpinRequest>,
    completions: EventWatcher<SpinResult>,
    winners: EventWatcher<WinnerEvent>,
    event_generation: EventGeneration,
    wheel_frame: usize,
    status: String,
    read_warning: Option<String>,
    errors: Vec<String>,
}

impl AppController {
    pub fn new(session: SessionContext, config: ControllerConfig) -> Self {
        Self {
            session,
            spin_timeout: config.spin_timeout,
            correlator: SpinCorrelator::new(),
            selected_asset: None,
            page: Page::default(),
            dashboard: Dashboard::default(),
            requests: watch_events(config.from_block),
            completions: watch_events(config.from_block),
            winners: watch_events(config.from_block),
            event_generation: 0,
            wheel_frame: 0,
            status: String::from("Loading..."),
            read_warning: None,
            errors: Vec::new(),
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn spin_timeout(&self) -> Duration {
        self.spin_timeout
    }

    pub fn phase(&self) -> &SpinPhase {
        self.correlator.phase()
    }

    pub fn is_spinning(&self) -> bool {
        self.correlator.is_busy()
    }

    pub fn current_ticket(&self) -> Option<Ticket> {
        self.correlator.current_ticket()
    }

    pub fn event_generation(&self) -> EventGeneration {
        self.event_generation
    }

    pub fn toggle_page(&mut self) {
        self.page = self.page.toggled();
    }

    pub fn select_next_asset(&mut self) {
        if self.is_spinning() {
            return;
        }
        self.selected_asset = Some(self.selected_asset.map_or(Asset::Btc, Asset::next));
    }

    pub fn select_prev_asset(&mut self) {
        if self.is_spinning() {
            return;
        }
        self.selected_asset = Some(self.selected_asset.map_or(Asset::Doge, Asset::prev));
    }

    pub fn select_asset(&mut self, asset: Asset) {
        if !self.is_spinning() {
            self.selected_asset = Some(asset);
        }
    }

    /// Accepts a spin locally. The caller submits the returned order and
    /// reports back through [`AppController::finish_submission`].
    pub fn start_spin(&mut self) -> Result<SpinOrder, SpinRejected> {
        let player = self.session.player.ok_or(SpinRejected::NotConnected)?;
        if self.is_spinning() {
            return Err(SpinRejected::AlreadyPending);
        }
        let asset = self.selected_asset.ok_or(SpinRejected::NoAssetSelected)?;
        let value = self
            .dashboard
            .total_spin_cost
            .ok_or(SpinRejected::CostUnknown)?;
        let ticket = self.correlator.begin(asset, player, self.requests.events())?;
        self.wheel_frame = usize::from(asset.index());
        self.set_status(format!(
            "Spinning on {} for {}...",
            asset,
            view::format_value(value, &self.session)
        ));
        Ok(SpinOrder {
            ticket,
            asset,
            value,
        })
    }

    pub fn finish_submission(
        &mut self,
        ticket: Ticket,
        outcome: Result<SpinReceipt, WriteFailure>,
    ) -> CorrelationUpdate {
        let update = match outcome {
            Ok(receipt) => self.correlator.submission_succeeded(
                ticket,
                &receipt,
                self.requests.events(),
                self.completions.events(),
            ),
            Err(failure) => self.correlator.submission_failed(ticket, failure),
        };
        self.apply_update(&update);
        update
    }

    pub fn expire_spin(&mut self, ticket: Ticket) -> CorrelationUpdate {
        let update = self.correlator.expire(ticket);
        self.apply_update(&update);
        update
    }

    pub fn ingest_readings(&mut self, readings: DashboardReadings) {
        let failures: Vec<String> =
            readings.failures().iter().map(|f| f.to_string()).collect();
        self.read_warning = failures.first().cloned();
        self.dashboard = Dashboard {
            current_day: readings.current_day.ok(),
            total_spin_cost: readings.total_spin_cost.ok(),
            ticket_price: readings.ticket_price.ok(),
            pool_amount: readings.pool_amount.ok(),
            whitelist: readings.whitelist.ok(),
            whitelist_size: readings.whitelist_size.ok(),
        };
        if self.status == "Loading..." && failures.is_empty() {
            self.set_status("Ready");
        }
    }

    pub fn events_failed(&mut self, failure: ReadFailure) {
        self.read_warning = Some(failure.to_string());
    }

    /// Feeds a scanned batch through the watchers in chain order and lets
    /// the correlator see each new event. Returns the correlation changes.
    /// Batches scanned before the latest [`AppController::resubscribe`] are
    /// dropped.
    pub fn ingest_events(
        &mut self,
        generation: EventGeneration,
        batch: &EventBatch,
    ) -> Vec<CorrelationUpdate> {
        if generation != self.event_generation {
            debug!(
                generation,
                current = self.event_generation,
                found = batch.events.len(),
                "dropping event batch from before resubscribe"
            );
            return Vec::new();
        }
        let mut updates = Vec::new();
        for record in &batch.events {
            let single = std::slice::from_ref(record);
            let update = match &record.event {
                ContractEvent::SpinRequested(_) => {
                    let Some(new) = self.requests.ingest(single).last().cloned() else {
                        continue;
                    };
                    self.correlator
                        .observe_request(&new.event, self.completions.events())
                }
                ContractEvent::SpinCompleted(_) => {
                    let Some(new) = self.completions.ingest(single).last().cloned() else {
                        continue;
                    };
                    self.correlator.observe_completion(&new.event)
                }
                ContractEvent::WinnerSelected(_) => {
                    if let Some(new) = self.winners.ingest(single).last() {
                        info!(day = new.event.day, prize = new.event.prize, "lottery winner selected");
                    }
                    continue;
                }
            };
            if update != CorrelationUpdate::Unchanged {
                self.apply_update(&update);
                updates.push(update);
            }
        }
        updates
    }

    /// Clears every watcher and returns the generation the poll worker must
    /// tag its rescans with.
    pub fn resubscribe(&mut self, from_block: u32) -> EventGeneration {
        self.event_generation += 1;
        self.requests.restart(from_block);
        self.completions.restart(from_block);
        self.winners.restart(from_block);
        self.set_status(format!("Reloading events from block {}...", from_block));
        self.event_generation
    }

    pub fn advance_wheel(&mut self) {
        if self.is_spinning() {
            self.wheel_frame = self.wheel_frame.wrapping_add(1);
        }
    }

    pub fn push_errors(&mut self, mut items: Vec<String>) {
        if items.is_empty() {
            return;
        }
        for item in &items {
            error!("{}", item);
        }
        self.errors.append(&mut items);
        if self.errors.len() > MAX_ERRORS {
            let drain = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..drain);
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
        debug!(status = %self.status, "status updated");
    }

    /// Today's lottery as far as reads and winner events tell.
    pub fn current_lottery_day(&self) -> Option<LotteryDay> {
        let day = self.dashboard.current_day?;
        let mut lottery = LotteryDay::open(
            day,
            self.dashboard.pool_amount.unwrap_or_default(),
            self.dashboard.whitelist.clone().unwrap_or_default(),
        );
        if let Some(event) = self.winners.events().rev().find(|w| w.day == day)
            && let Err(err) = lottery.close(event)
        {
            warn!(error = %err, "ignoring winner event");
        }
        Some(lottery)
    }

    fn apply_update(&mut self, update: &CorrelationUpdate) {
        match update {
            CorrelationUpdate::Unchanged => {}
            CorrelationUpdate::AwaitingSequence => {
                self.set_status("Spin submitted; waiting for the request event...");
            }
            CorrelationUpdate::SequenceAssigned(sequence) => {
                self.set_status(format!(
                    "Spin #{} submitted; waiting for the oracle...",
                    sequence
                ));
            }
            CorrelationUpdate::Resolved(result) => {
                let banner = view::result_banner(result);
                self.set_status(format!(
                    "Spin #{}: {} {}",
                    result.sequence_number, banner.headline, banner.detail
                ));
            }
            CorrelationUpdate::TimedOut { sequence } => {
                let message = view::timeout_message(*sequence);
                self.set_status(message.clone());
                self.push_errors(vec![message]);
            }
            CorrelationUpdate::Failed(failure) => {
                self.set_status("Spin failed");
                self.push_errors(vec![format!("Spin failed: {}", failure)]);
            }
        }
    }

    pub fn snapshot(&self) -> AppSnapshot {
        let session = &self.session;
        let player = session.player.as_ref();
        let lottery = self.current_lottery_day();
        let your_entries = lottery
            .as_ref()
            .map_or(0, |day| view::user_entries(&day.whitelist, player));
        let total_entries = self
            .dashboard
            .whitelist_size
            .or_else(|| self.dashboard.whitelist.as_ref().map(|w| w.len() as u64));

        let (wheel, banner) = match self.correlator.phase() {
            phase if phase.is_busy() => (Some(view::wheel_highlight(self.wheel_frame)), None),
            SpinPhase::Resolved { result, .. } => (
                result.resolved_asset().or(self.selected_asset),
                Some(view::result_banner(result)),
            ),
            _ => (self.selected_asset, None),
        };

        let recent_spins = view::recent_spins(self.completions.events(), player);
        let recent_winners = view::recent_winners(self.winners.events());

        AppSnapshot {
            page: self.page,
            network: session.network.clone(),
            player: player.map(view::full_address),
            player_short: player.map(view::short_address),
            current_day: self
                .dashboard
                .current_day
                .map_or_else(|| view::PLACEHOLDER.to_string(), |d| d.to_string()),
            spin_cost: view::format_reading(self.dashboard.total_spin_cost, session),
            ticket_price: view::format_reading(self.dashboard.ticket_price, session),
            pool: view::format_pool(self.dashboard.pool_amount, session),
            total_entries: total_entries
                .map_or_else(|| view::PLACEHOLDER.to_string(), |n| n.to_string()),
            your_entries,
            eligibility: view::eligibility_label(your_entries),
            entries_hint: view::entries_hint(your_entries),
            today_winner: lottery
                .as_ref()
                .and_then(|day| day.winner.as_ref())
                .map(view::short_address),
            selected_asset: self.selected_asset,
            wheel,
            spin_label: view::spin_button_label(
                session.is_connected(),
                self.is_spinning(),
                self.selected_asset,
            ),
            spinning: self.is_spinning(),
            banner,
            recent_spins: view::spin_rows(&recent_spins),
            recent_winners: view::winner_rows(&recent_winners, session),
            status: self.status.clone(),
            read_warning: self.read_warning.clone(),
            errors: self.errors.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        events::{
            EventPosition,
            Recorded,
        },
        test_helpers::player,
    };

    fn controller_for(who: u8) -> AppController {
        AppController::new(
            SessionContext::connected(player(who), "Local"),
            ControllerConfig::default(),
        )
    }

    fn readings(day: u64, spin_cost: u64) -> DashboardReadings {
        DashboardReadings {
            current_day: Ok(day),
            total_spin_cost: Ok(spin_cost),
            ticket_price: Ok(spin_cost / 2),
            pool_amount: Ok(0),
            whitelist: Ok(Vec::new()),
            whitelist_size: Ok(0),
        }
    }

    fn winner_selected(day: u64) -> ContractEvent {
        ContractEvent::WinnerSelected(WinnerEvent {
            day,
            winner: player(day as u8),
            prize: 1_000_000_000,
        })
    }

    fn batch(events: Vec<ContractEvent>) -> EventBatch {
        let next_block = events.len() as u32 + 1;
        EventBatch {
            events: events
                .into_iter()
                .enumerate()
                .map(|(i, event)| Recorded {
                    position: EventPosition {
                        block_height: i as u32 + 1,
                        ..Default::default()
                    },
                    event,
                })
                .collect(),
            next_block,
        }
    }

    #[test]
    fn start_spin__requires_a_connected_wallet() {
        // given
        let mut controller = AppController::new(
            SessionContext::disconnected("Local"),
            ControllerConfig::default(),
        );
        controller.ingest_readings(readings(1, 100));
        controller.select_asset(Asset::Eth);

        // when
        let result = controller.start_spin();

        // then
        assert_eq!(result, Err(SpinRejected::NotConnected));
        assert_eq!(controller.snapshot().spin_label, "Connect Wallet");
    }

    #[test]
    fn start_spin__pays_the_total_spin_cost_for_the_selected_asset() {
        // given
        let mut controller = controller_for(1);
        controller.ingest_readings(readings(1, 150));
        controller.select_asset(Asset::Sol);

        // when
        let order = controller.start_spin().unwrap();

        // then
        assert_eq!(order.asset, Asset::Sol);
        assert_eq!(order.value, 150);
        let snapshot = controller.snapshot();
        assert!(snapshot.spinning);
        assert_eq!(snapshot.spin_label, "Spinning...");
    }

    #[test]
    fn start_spin__rejects_without_asset_or_cost() {
        let mut controller = controller_for(1);
        assert_eq!(controller.start_spin(), Err(SpinRejected::NoAssetSelected));
        controller.select_asset(Asset::Btc);
        assert_eq!(controller.start_spin(), Err(SpinRejected::CostUnknown));
    }

    #[test]
    fn select_next_asset__is_ignored_while_spinning() {
        // given
        let mut controller = controller_for(1);
        controller.ingest_readings(readings(1, 100));
        controller.select_asset(Asset::Btc);
        controller.start_spin().unwrap();

        // when
        controller.select_next_asset();

        // then
        assert_eq!(controller.snapshot().selected_asset, Some(Asset::Btc));
    }

    #[test]
    fn ingest_events__resolves_the_pending_spin_and_shows_the_banner() {
        // given
        let mut controller = controller_for(1);
        controller.ingest_readings(readings(2, 100));
        controller.select_asset(Asset::Eth);
        let order = controller.start_spin().unwrap();
        let request = SpinRequest {
            player: player(1),
            asset_index: 1,
            sequence_number: 7,
            requested_block: 1,
        };
        controller.finish_submission(
            order.ticket,
            Ok(SpinReceipt {
                requests: vec![request.clone()],
                block_height: 1,
            }),
        );

        // when
        let updates = controller.ingest_events(0, &batch(vec![
            ContractEvent::SpinRequested(request),
            ContractEvent::SpinCompleted(SpinResult {
                sequence_number: 6,
                result_index: 0,
                won: false,
                player: player(2),
            }),
            ContractEvent::SpinCompleted(SpinResult {
                sequence_number: 7,
                result_index: 1,
                won: true,
                player: player(1),
            }),
        ]));

        // then
        assert_eq!(updates.len(), 1);
        let snapshot = controller.snapshot();
        let banner = snapshot.banner.unwrap();
        assert_eq!(banner.headline, "YOU WON!");
        assert_eq!(banner.detail, "Result: ETH");
        assert_eq!(snapshot.wheel, Some(Asset::Eth));
        assert_eq!(snapshot.recent_spins.len(), 1);
        assert_eq!(snapshot.recent_spins[0].sequence, "#7");
        assert!(!snapshot.spinning);
    }

    #[test]
    fn ingest_events__drops_batches_scanned_before_resubscribe() {
        // given
        let mut controller = controller_for(1);
        let history = batch((1..=3).map(winner_selected).collect());
        controller.ingest_events(0, &history);
        let generation = controller.resubscribe(0);
        let stale = EventBatch {
            events: vec![Recorded {
                position: EventPosition {
                    block_height: 9,
                    ..Default::default()
                },
                event: winner_selected(9),
            }],
            next_block: 10,
        };
        let mut rescan = history.clone();
        rescan.events.extend(stale.events.clone());
        rescan.next_block = 10;

        // when
        controller.ingest_events(0, &stale);
        controller.ingest_events(generation, &rescan);

        // then
        let days: Vec<String> = controller
            .snapshot()
            .recent_winners
            .into_iter()
            .map(|w| w.day)
            .collect();
        assert_eq!(generation, 1);
        assert_eq!(days, vec!["Day 9", "Day 3", "Day 2", "Day 1"]);
    }

    #[test]
    fn finish_submission__failure_reenables_spinning_and_reports_error() {
        // given
        let mut controller = controller_for(1);
        controller.ingest_readings(readings(2, 100));
        controller.select_asset(Asset::Eth);
        let order = controller.start_spin().unwrap();

        // when
        controller.finish_submission(
            order.ticket,
            Err(WriteFailure::Reverted("InsufficientPayment".into())),
        );

        // then
        let snapshot = controller.snapshot();
        assert!(!snapshot.spinning);
        assert_eq!(snapshot.spin_label, "SPIN!");
        assert_eq!(snapshot.errors.len(), 1);
        assert!(snapshot.errors[0].contains("InsufficientPayment"));
    }

    #[test]
    fn expire_spin__shows_timeout_alert_with_sequence() {
        // given
        let mut controller = controller_for(1);
        controller.ingest_readings(readings(2, 100));
        controller.select_asset(Asset::Eth);
        let order = controller.start_spin().unwrap();
        controller.finish_submission(
            order.ticket,
            Ok(SpinReceipt {
                requests: vec![SpinRequest {
                    player: player(1),
                    asset_index: 1,
                    sequence_number: 11,
                    requested_block: 1,
                }],
                block_height: 1,
            }),
        );

        // when
        controller.expire_spin(order.ticket);

        // then
        let snapshot = controller.snapshot();
        assert!(!snapshot.spinning);
        assert!(snapshot.errors[0].starts_with("Spin #11 timed out"));
    }

    #[test]
    fn ingest_readings__failures_fall_back_to_placeholders() {
        // given
        let mut controller = controller_for(1);
        controller.ingest_readings(readings(2, 100));

        // when
        controller.ingest_readings(DashboardReadings {
            total_spin_cost: Err(ReadFailure::rpc("get_total_spin_cost", "timeout")),
            ..readings(2, 100)
        });

        // then
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.spin_cost, "...");
        assert_eq!(snapshot.current_day, "2");
        assert!(snapshot.read_warning.is_some());
        assert!(snapshot.errors.is_empty());
    }

    #[test]
    fn push_errors__keeps_only_the_latest_entries() {
        let mut controller = controller_for(1);
        controller.push_errors((0..8).map(|i| format!("error {i}")).collect());
        let errors = controller.snapshot().errors;
        assert_eq!(errors.len(), MAX_ERRORS);
        assert_eq!(errors.last().map(String::as_str), Some("error 7"));
    }

    #[test]
    fn toggle_page__switches_between_roulette_and_lottery() {
        let mut controller = controller_for(1);
        controller.toggle_page();
        assert_eq!(controller.snapshot().page, Page::Lottery);
        controller.toggle_page();
        assert_eq!(controller.snapshot().page, Page::Roulette);
    }
}
