use crate::{
    asset::Asset,
    lottery_types::DailyLottery,
    model::SpinRequest,
    roulette_types::{
        CryptoRoulette,
        SpinRequested,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use fuels::{
    accounts::wallet::Wallet,
    prelude::{
        AssetId,
        CallParameters,
        ContractId,
        Execution,
        Provider,
        TxPolicies,
        VariableOutputPolicy,
    },
    types::{
        Identity,
        errors::Error as FuelsError,
    },
};
use std::future::Future;
use tracing::{
    info,
    warn,
};

const DEFAULT_SAFE_SCRIPT_GAS_LIMIT: u64 = 29_000_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadFailure {
    #[error("{call} failed: {reason}")]
    Rpc { call: &'static str, reason: String },
    #[error("{call} needs the current day, which is not known yet")]
    DayUnknown { call: &'static str },
}

impl ReadFailure {
    pub fn rpc(call: &'static str, err: impl std::fmt::Display) -> Self {
        ReadFailure::Rpc {
            call,
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteFailure {
    #[error("spin was rejected before submission: {0}")]
    Rejected(String),
    #[error("spin transaction reverted: {0}")]
    Reverted(String),
    #[error("spin submission failed: {0}")]
    Transport(String),
}

impl From<FuelsError> for WriteFailure {
    fn from(err: FuelsError) -> Self {
        match err {
            FuelsError::Transaction(reason) => WriteFailure::Reverted(reason.to_string()),
            FuelsError::Provider(msg) => WriteFailure::Transport(msg),
            other => WriteFailure::Rejected(other.to_string()),
        }
    }
}

/// What a successful `spin_roulette` submission tells us: the request logs
/// emitted by the transaction itself and the chain height seen afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpinReceipt {
    pub requests: Vec<SpinRequest>,
    pub block_height: u32,
}

impl SpinReceipt {
    pub fn request_for(&self, player: &Identity) -> Option<&SpinRequest> {
        self.requests.iter().rev().find(|r| r.player == *player)
    }
}

/// Point-in-time queries against the roulette and lottery view functions.
pub trait ContractReader {
    fn read_current_day(&self) -> impl Future<Output = Result<u64, ReadFailure>> + Send;

    fn read_pool_amount(
        &self,
        day: u64,
    ) -> impl Future<Output = Result<u64, ReadFailure>> + Send;

    fn read_whitelist(
        &self,
        day: u64,
    ) -> impl Future<Output = Result<Vec<Identity>, ReadFailure>> + Send;

    fn read_whitelist_size(
        &self,
        day: u64,
    ) -> impl Future<Output = Result<u64, ReadFailure>> + Send;

    fn read_ticket_price(&self) -> impl Future<Output = Result<u64, ReadFailure>> + Send;

    fn read_total_spin_cost(
        &self,
    ) -> impl Future<Output = Result<u64, ReadFailure>> + Send;
}

pub trait ContractWriter {
    /// Pays `value` of the base asset and asks the oracle for a spin.
    fn spin_roulette(
        &self,
        asset: Asset,
        value: u64,
    ) -> impl Future<Output = Result<SpinReceipt, WriteFailure>> + Send;
}

#[derive(Clone)]
pub struct FuelContracts {
    provider: Provider,
    roulette: CryptoRoulette<Wallet>,
    lottery: DailyLottery<Wallet>,
    roulette_id: ContractId,
    lottery_id: ContractId,
    base_asset_id: AssetId,
    safe_script_gas_limit: u64,
}

impl FuelContracts {
    pub async fn connect(
        wallet: Wallet,
        provider: Provider,
        roulette_id: ContractId,
        lottery_id: ContractId,
    ) -> Result<Self> {
        let consensus_parameters = provider
            .consensus_parameters()
            .await
            .wrap_err("failed to fetch consensus parameters")?;
        let base_asset_id = *consensus_parameters.base_asset_id();
        let max_gas_per_tx = consensus_parameters.tx_params().max_gas_per_tx();
        let safe_script_gas_limit = max_gas_per_tx
            .saturating_sub(1)
            .clamp(1, DEFAULT_SAFE_SCRIPT_GAS_LIMIT);
        info!(
            safe_script_gas_limit,
            max_gas_per_tx, "using safe script gas limit"
        );

        Ok(Self {
            roulette: CryptoRoulette::new(roulette_id, wallet.clone()),
            lottery: DailyLottery::new(lottery_id, wallet),
            provider,
            roulette_id,
            lottery_id,
            base_asset_id,
            safe_script_gas_limit,
        })
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn roulette(&self) -> &CryptoRoulette<Wallet> {
        &self.roulette
    }

    pub fn lottery(&self) -> &DailyLottery<Wallet> {
        &self.lottery
    }

    pub fn roulette_id(&self) -> ContractId {
        self.roulette_id
    }

    pub fn lottery_id(&self) -> ContractId {
        self.lottery_id
    }

    fn script_policies(&self) -> TxPolicies {
        TxPolicies::default().with_script_gas_limit(self.safe_script_gas_limit)
    }
}

impl ContractReader for FuelContracts {
    async fn read_current_day(&self) -> Result<u64, ReadFailure> {
        self.roulette
            .methods()
            .get_current_day()
            .with_tx_policies(self.script_policies())
            .simulate(Execution::realistic())
            .await
            .map(|r| r.value)
            .map_err(|e| ReadFailure::rpc("get_current_day", e))
    }

    async fn read_pool_amount(&self, day: u64) -> Result<u64, ReadFailure> {
        self.lottery
            .methods()
            .get_pool_amount(day)
            .with_tx_policies(self.script_policies())
            .simulate(Execution::realistic())
            .await
            .map(|r| r.value)
            .map_err(|e| ReadFailure::rpc("get_pool_amount", e))
    }

    async fn read_whitelist(&self, day: u64) -> Result<Vec<Identity>, ReadFailure> {
        self.lottery
            .methods()
            .get_whitelist(day)
            .with_tx_policies(self.script_policies())
            .simulate(Execution::realistic())
            .await
            .map(|r| r.value)
            .map_err(|e| ReadFailure::rpc("get_whitelist", e))
    }

    async fn read_whitelist_size(&self, day: u64) -> Result<u64, ReadFailure> {
        self.lottery
            .methods()
            .get_whitelist_size(day)
            .with_tx_policies(self.script_policies())
            .simulate(Execution::realistic())
            .await
            .map(|r| r.value)
            .map_err(|e| ReadFailure::rpc("get_whitelist_size", e))
    }

    async fn read_ticket_price(&self) -> Result<u64, ReadFailure> {
        self.roulette
            .methods()
            .ticket_price()
            .with_tx_policies(self.script_policies())
            .simulate(Execution::realistic())
            .await
            .map(|r| r.value)
            .map_err(|e| ReadFailure::rpc("ticket_price", e))
    }

    async fn read_total_spin_cost(&self) -> Result<u64, ReadFailure> {
        self.roulette
            .methods()
            .get_total_spin_cost()
            .with_tx_policies(self.script_policies())
            .simulate(Execution::realistic())
            .await
            .map(|r| r.value)
            .map_err(|e| ReadFailure::rpc("get_total_spin_cost", e))
    }
}

impl ContractWriter for FuelContracts {
    async fn spin_roulette(
        &self,
        asset: Asset,
        value: u64,
    ) -> Result<SpinReceipt, WriteFailure> {
        let call =
            CallParameters::new(value, self.base_asset_id, self.safe_script_gas_limit);
        info!(%asset, value, "submitting spin_roulette");
        let response = self
            .roulette
            .methods()
            .spin_roulette(asset.index())
            .call_params(call)?
            .with_variable_output_policy(VariableOutputPolicy::EstimateMinimum)
            .with_tx_policies(self.script_policies())
            .call()
            .await?;

        let block_height = match self.provider.latest_block_height().await {
            Ok(height) => height,
            Err(err) => {
                warn!(error = %err, "spin included but latest block height unavailable");
                0
            }
        };
        let requests = match response.decode_logs_with_type::<SpinRequested>() {
            Ok(logs) => logs
                .into_iter()
                .map(|log| SpinRequest::from_log(log, block_height))
                .collect(),
            Err(err) => {
                warn!(error = %err, "spin included but SpinRequested log did not decode");
                Vec::new()
            }
        };
        Ok(SpinReceipt {
            requests,
            block_height,
        })
    }
}
