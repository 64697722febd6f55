use fuels::types::Identity;

/// Fuel's base asset is ETH with 9 decimals.
pub const BASE_ASSET_DECIMALS: u32 = 9;
pub const BASE_ASSET_SYMBOL: &str = "ETH";

/// Who is connected and to what. Passed explicitly to whatever renders or
/// acts on behalf of the player.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionContext {
    pub player: Option<Identity>,
    pub network: String,
    pub decimals: u32,
    pub symbol: String,
}

impl SessionContext {
    pub fn connected(player: Identity, network: impl Into<String>) -> Self {
        Self {
            player: Some(player),
            ..Self::disconnected(network)
        }
    }

    pub fn disconnected(network: impl Into<String>) -> Self {
        Self {
            player: None,
            network: network.into(),
            decimals: BASE_ASSET_DECIMALS,
            symbol: BASE_ASSET_SYMBOL.to_string(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.player.is_some()
    }
}
