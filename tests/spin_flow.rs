#![allow(non_snake_case)]
use crypto_roulette::{
    asset::Asset,
    contracts::{
        ContractWriter,
        WriteFailure,
    },
    controller::{
        AppController,
        ControllerConfig,
    },
    correlator::CorrelationUpdate,
    events::EventSource,
    scheduler::read_dashboard,
    session::SessionContext,
    test_helpers::{
        FakeChain,
        player,
    },
};

const SPIN_COST: u64 = 1_100_000;

async fn setup() -> (FakeChain, AppController) {
    let chain = FakeChain::default();
    chain.set_current_day(3);
    chain.set_spin_cost(SPIN_COST);
    chain.set_ticket_price(1_000_000);
    let mut controller = AppController::new(
        SessionContext::connected(player(1), "Local"),
        ControllerConfig::default(),
    );
    refresh(&chain, &mut controller).await;
    (chain, controller)
}

async fn refresh(chain: &FakeChain, controller: &mut AppController) -> Vec<CorrelationUpdate> {
    controller.ingest_readings(read_dashboard(chain).await);
    let batch = chain.scan_from(0).await.unwrap();
    let generation = controller.event_generation();
    controller.ingest_events(generation, &batch)
}

#[tokio::test]
async fn spin__winning_spin_shows_banner_and_lottery_entry() {
    // given
    let (chain, mut controller) = setup().await;
    chain.set_next_sequence(7);
    controller.select_asset(Asset::Eth);

    // when
    let order = controller.start_spin().unwrap();
    let receipt = chain
        .as_caller(player(1))
        .spin_roulette(order.asset, order.value)
        .await;
    let submitted = controller.finish_submission(order.ticket, receipt);
    chain.complete_spin(7, Asset::Eth, true);
    let updates = refresh(&chain, &mut controller).await;

    // then
    assert_eq!(submitted, CorrelationUpdate::SequenceAssigned(7));
    assert_eq!(chain.spins(), vec![(player(1), Asset::Eth, SPIN_COST)]);
    assert!(matches!(
        updates.as_slice(),
        [CorrelationUpdate::Resolved(result)] if result.sequence_number == 7 && result.won
    ));
    let snap = controller.snapshot();
    let banner = snap.banner.expect("resolved spin shows a banner");
    assert_eq!(banner.headline, "YOU WON!");
    assert_eq!(banner.detail, "Result: ETH");
    assert!(banner.lottery_note.is_some());
    assert!(!snap.spinning);
    assert_eq!(snap.your_entries, 1);
    assert_eq!(snap.recent_spins.len(), 1);
    assert_eq!(snap.recent_spins[0].sequence, "#7");
    assert_eq!(snap.recent_spins[0].status, "Won");
}

#[tokio::test]
async fn spin__losing_spin_leaves_lottery_untouched() {
    // given
    let (chain, mut controller) = setup().await;
    chain.set_next_sequence(2);
    controller.select_asset(Asset::Doge);

    // when
    let order = controller.start_spin().unwrap();
    let receipt = chain
        .as_caller(player(1))
        .spin_roulette(order.asset, order.value)
        .await;
    controller.finish_submission(order.ticket, receipt);
    chain.complete_spin(2, Asset::Btc, false);
    refresh(&chain, &mut controller).await;

    // then
    let snap = controller.snapshot();
    let banner = snap.banner.unwrap();
    assert_eq!(banner.headline, "Try Again!");
    assert_eq!(banner.detail, "Result: BTC");
    assert_eq!(banner.lottery_note, None);
    assert_eq!(snap.your_entries, 0);
    assert_eq!(snap.recent_spins[0].status, "Lost");
}

#[tokio::test]
async fn spin__reverted_submission_frees_the_wheel() {
    // given
    let (chain, mut controller) = setup().await;
    chain.reject_spins(WriteFailure::Reverted("InsufficientPayment".to_string()));
    controller.select_asset(Asset::Sol);

    // when
    let order = controller.start_spin().unwrap();
    let receipt = chain
        .as_caller(player(1))
        .spin_roulette(order.asset, order.value)
        .await;
    let update = controller.finish_submission(order.ticket, receipt);

    // then
    assert!(matches!(update, CorrelationUpdate::Failed(WriteFailure::Reverted(_))));
    let snap = controller.snapshot();
    assert!(!snap.spinning);
    assert_eq!(snap.spin_label, "SPIN!");
    assert!(snap.errors.iter().any(|e| e.contains("InsufficientPayment")));
    assert!(controller.start_spin().is_ok());
}

#[tokio::test]
async fn spin__receipt_without_logs_adopts_the_next_request_of_the_player() {
    // given
    let (chain, mut controller) = setup().await;
    chain.set_next_sequence(40);
    // another player's spin is already on chain
    chain
        .as_caller(player(2))
        .spin_roulette(Asset::Btc, SPIN_COST)
        .await
        .unwrap();
    refresh(&chain, &mut controller).await;
    chain.omit_receipt_logs();
    controller.select_asset(Asset::Avax);

    // when
    let order = controller.start_spin().unwrap();
    let receipt = chain
        .as_caller(player(1))
        .spin_roulette(order.asset, order.value)
        .await;
    let submitted = controller.finish_submission(order.ticket, receipt);
    let observed = refresh(&chain, &mut controller).await;
    chain.complete_spin(40, Asset::Btc, true);
    chain.complete_spin(41, Asset::Avax, true);
    let resolved = refresh(&chain, &mut controller).await;

    // then
    assert_eq!(submitted, CorrelationUpdate::AwaitingSequence);
    assert_eq!(observed, vec![CorrelationUpdate::SequenceAssigned(41)]);
    assert!(matches!(
        resolved.as_slice(),
        [CorrelationUpdate::Resolved(result)] if result.sequence_number == 41
    ));
    assert_eq!(controller.snapshot().banner.unwrap().detail, "Result: AVAX");
}

#[tokio::test]
async fn spin__stale_deadline_does_not_cancel_a_newer_spin() {
    // given
    let (chain, mut controller) = setup().await;
    chain.set_next_sequence(1);
    controller.select_asset(Asset::Eth);
    let first = controller.start_spin().unwrap();
    let receipt = chain
        .as_caller(player(1))
        .spin_roulette(first.asset, first.value)
        .await;
    controller.finish_submission(first.ticket, receipt);
    chain.complete_spin(1, Asset::Eth, false);
    refresh(&chain, &mut controller).await;
    let second = controller.start_spin().unwrap();

    // when
    let stale = controller.expire_spin(first.ticket);
    let current = controller.expire_spin(second.ticket);

    // then
    assert_eq!(stale, CorrelationUpdate::Unchanged);
    assert_eq!(current, CorrelationUpdate::TimedOut { sequence: None });
    assert!(!controller.is_spinning());
}
