use crate::ui;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use crossterm::event::EventStream;
use crypto_roulette::{
    contracts::{
        ContractWriter,
        FuelContracts,
        SpinReceipt,
        WriteFailure,
    },
    controller::{
        AppController,
        ControllerConfig,
        SpinOrder,
    },
    correlator::{
        SpinDeadline,
        Ticket,
    },
    deployment::{
        self,
        DeploymentEnv,
        DeploymentStore,
    },
    events::{
        DEFAULT_MAX_BLOCKS_PER_SCAN,
        FuelEventSource,
    },
    scheduler::{
        IntervalTicker,
        PollCommand,
        PollEvent,
        PollScheduler,
    },
    session::SessionContext,
    wallets::{
        self,
        KeystoreDir,
    },
};
use fuels::{
    accounts::ViewOnlyAccount,
    prelude::{
        ContractId,
        Provider,
    },
    types::Identity,
};
use futures::StreamExt;
use std::{
    path::PathBuf,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    time,
};
use tracing::{
    error,
    info,
    warn,
};

pub const DEFAULT_TESTNET_RPC_URL: &str = "https://testnet.fuel.network";
pub const DEFAULT_DEVNET_RPC_URL: &str = "https://devnet.fuel.network";
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://localhost:4000/";
const WHEEL_FRAME: Duration = Duration::from_millis(120);

#[derive(Clone, Debug)]
pub enum NetworkTarget {
    Testnet { url: String },
    Devnet { url: String },
    LocalNode { url: String },
}

impl NetworkTarget {
    pub fn url(&self) -> &str {
        match self {
            NetworkTarget::Testnet { url }
            | NetworkTarget::Devnet { url }
            | NetworkTarget::LocalNode { url } => url,
        }
    }

    pub fn env(&self) -> DeploymentEnv {
        match self {
            NetworkTarget::Testnet { .. } => DeploymentEnv::Test,
            NetworkTarget::Devnet { .. } => DeploymentEnv::Dev,
            NetworkTarget::LocalNode { .. } => DeploymentEnv::Local,
        }
    }
}

#[derive(Clone, Debug)]
pub enum WalletConfig {
    ForcKeystore { name: String, dir: KeystoreDir },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub network: NetworkTarget,
    pub wallet: WalletConfig,
    pub roulette_contract: Option<String>,
    pub lottery_contract: Option<String>,
    pub from_block: Option<u32>,
    pub spin_timeout: Duration,
    pub poll_interval: Duration,
    pub log_dir: PathBuf,
}

struct Connection {
    contracts: FuelContracts,
    events: FuelEventSource,
    session: SessionContext,
    from_block: u32,
}

fn contract_id_from(
    flag: Option<&str>,
    record: Option<&deployment::DeploymentRecord>,
    pick: fn(&deployment::DeploymentRecord) -> Result<ContractId>,
    what: &str,
    store: &DeploymentStore,
) -> Result<ContractId> {
    match (flag, record) {
        (Some(raw), _) => deployment::parse_contract_id(raw),
        (None, Some(record)) => pick(record),
        (None, None) => Err(eyre!(
            "No {what} contract id: pass it on the command line or add a record to {}",
            store.path().display()
        )),
    }
}

async fn connect(config: &AppConfig) -> Result<Connection> {
    let env = config.network.env();
    let url = config.network.url();
    info!(%env, url, "connecting to provider");
    let provider = Provider::connect(url)
        .await
        .wrap_err_with(|| format!("Failed to connect to provider at {url}"))?;

    let WalletConfig::ForcKeystore { name, dir } = &config.wallet;
    let keystore = dir
        .open(name)
        .wrap_err_with(|| format!("Failed to locate wallet '{name}'"))?;
    let wallet = wallets::unlock_keystore(&keystore, &provider)?;
    let player = Identity::Address((*wallet.address()).into());

    let store = DeploymentStore::new(env)?;
    let record = store.latest()?;
    let roulette_id = contract_id_from(
        config.roulette_contract.as_deref(),
        record.as_ref(),
        deployment::DeploymentRecord::roulette_id,
        "roulette",
        &store,
    )?;
    let lottery_id = contract_id_from(
        config.lottery_contract.as_deref(),
        record.as_ref(),
        deployment::DeploymentRecord::lottery_id,
        "lottery",
        &store,
    )?;
    let from_block = config
        .from_block
        .or_else(|| record.as_ref().and_then(|r| r.deployment_block_height))
        .unwrap_or_default();
    info!(%roulette_id, %lottery_id, from_block, "using deployment");

    let contracts = FuelContracts::connect(wallet, provider, roulette_id, lottery_id)
        .await
        .wrap_err("Failed to prepare contract bindings")?;
    let events = FuelEventSource::new(&contracts, DEFAULT_MAX_BLOCKS_PER_SCAN);

    Ok(Connection {
        contracts,
        events,
        session: SessionContext::connected(player, env.to_string()),
        from_block,
    })
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let connection = connect(&config).await?;
    let mut ui_state = ui::UiState::default();
    let mut input_events = EventStream::new();

    info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(connection, &config, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    res
}

fn submit_spin(
    writer: FuelContracts,
    order: SpinOrder,
    spin_tx: mpsc::UnboundedSender<(Ticket, Result<SpinReceipt, WriteFailure>)>,
) {
    tokio::spawn(async move {
        let outcome = writer.spin_roulette(order.asset, order.value).await;
        if let Err(err) = &outcome {
            error!(error = %err, ticket = order.ticket, "spin submission failed");
        }
        let _ = spin_tx.send((order.ticket, outcome));
    });
}

async fn run_loop(
    connection: Connection,
    config: &AppConfig,
    ui_state: &mut ui::UiState,
    input_events: &mut EventStream,
) -> Result<()> {
    info!("Running app loop");
    let Connection {
        contracts,
        events,
        session,
        from_block,
    } = connection;
    let mut controller = AppController::new(
        session,
        ControllerConfig {
            from_block,
            spin_timeout: config.spin_timeout,
        },
    );

    let (poll_cmd_tx, poll_cmd_rx) = mpsc::unbounded_channel();
    let (poll_event_tx, mut poll_event_rx) = mpsc::unbounded_channel();
    let poll_handle = tokio::spawn(
        PollScheduler::new(
            contracts.clone(),
            events,
            IntervalTicker::new(config.poll_interval),
            from_block,
        )
        .run(poll_cmd_rx, poll_event_tx),
    );
    let (spin_tx, mut spin_rx) = mpsc::unbounded_channel();
    let (expired_tx, mut expired_rx) = mpsc::unbounded_channel();
    let mut deadline: Option<SpinDeadline> = None;
    let mut wheel = time::interval(WHEEL_FRAME);

    ui::draw(ui_state, &controller.snapshot()).wrap_err("initial draw failed")?;

    loop {
        tokio::select! {
            maybe_event = poll_event_rx.recv() => {
                match maybe_event {
                    Some(PollEvent::Readings(readings)) => controller.ingest_readings(readings),
                    Some(PollEvent::Events { generation, batch }) => {
                        controller.ingest_events(generation, &batch);
                    }
                    Some(PollEvent::EventsFailed(failure)) => controller.events_failed(failure),
                    None => {
                        warn!("poll worker channel closed");
                        break;
                    }
                }
            }
            Some((ticket, outcome)) = spin_rx.recv() => {
                controller.finish_submission(ticket, outcome);
            }
            Some(ticket) = expired_rx.recv() => {
                controller.expire_spin(ticket);
            }
            _ = wheel.tick(), if controller.is_spinning() => {
                controller.advance_wheel();
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            maybe_input = input_events.next() => {
                let Some(raw) = maybe_input else {
                    break;
                };
                let raw = raw.wrap_err("reading terminal input failed")?;
                let Some(ev) = ui::interpret_event(ui_state, raw) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Redraw => {}
                    ui::UserEvent::NextAsset => controller.select_next_asset(),
                    ui::UserEvent::PrevAsset => controller.select_prev_asset(),
                    ui::UserEvent::PickAsset(asset) => controller.select_asset(asset),
                    ui::UserEvent::TogglePage => controller.toggle_page(),
                    ui::UserEvent::Refresh => {
                        let _ = poll_cmd_tx.send(PollCommand::FetchNow);
                        controller.set_status("Refreshing...");
                    }
                    ui::UserEvent::ReloadEvents => {
                        let generation = controller.resubscribe(from_block);
                        let _ = poll_cmd_tx.send(PollCommand::Resubscribe {
                            from_block,
                            generation,
                        });
                    }
                    ui::UserEvent::Spin => match controller.start_spin() {
                        Ok(order) => {
                            deadline = Some(SpinDeadline::arm(
                                order.ticket,
                                controller.spin_timeout(),
                                expired_tx.clone(),
                            ));
                            submit_spin(contracts.clone(), order, spin_tx.clone());
                        }
                        Err(rejected) => controller.set_status(rejected.to_string()),
                    },
                }
            }
        }

        if deadline.is_some() && !controller.is_spinning() {
            deadline = None;
        }
        ui::draw(ui_state, &controller.snapshot()).wrap_err("draw failed")?;
    }

    drop(deadline);
    let _ = poll_cmd_tx.send(PollCommand::Shutdown);
    match poll_handle.await {
        Ok(Err(err)) => warn!(?err, "poll worker stopped with error"),
        Err(err) => warn!(?err, "poll worker task failed"),
        Ok(Ok(())) => {}
    }
    Ok(())
}
