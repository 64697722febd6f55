use std::{
    fmt,
    str::FromStr,
};

use ratatui::style::Color;

/// The five tokens a player can guess. The discriminant is the index the
/// roulette contract expects in `spin_roulette`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Asset {
    Btc = 0,
    Eth = 1,
    Sol = 2,
    Avax = 3,
    Doge = 4,
}

pub const ALL_ASSETS: [Asset; 5] =
    [Asset::Btc, Asset::Eth, Asset::Sol, Asset::Avax, Asset::Doge];

impl Asset {
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        ALL_ASSETS.get(usize::from(index)).copied()
    }

    pub fn ticker(self) -> &'static str {
        match self {
            Asset::Btc => "BTC",
            Asset::Eth => "ETH",
            Asset::Sol => "SOL",
            Asset::Avax => "AVAX",
            Asset::Doge => "DOGE",
        }
    }

    pub fn color(self) -> Color {
        match self {
            Asset::Btc => Color::Rgb(247, 147, 26),
            Asset::Eth => Color::Rgb(98, 126, 234),
            Asset::Sol => Color::Rgb(153, 69, 255),
            Asset::Avax => Color::Rgb(232, 65, 66),
            Asset::Doge => Color::Rgb(194, 166, 51),
        }
    }

    pub fn next(self) -> Self {
        let idx = (usize::from(self.index()) + 1) % ALL_ASSETS.len();
        ALL_ASSETS[idx]
    }

    pub fn prev(self) -> Self {
        let len = ALL_ASSETS.len();
        let idx = (usize::from(self.index()) + len - 1) % len;
        ALL_ASSETS[idx]
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ticker())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown asset ticker: {0}")]
pub struct UnknownAsset(pub String);

impl FromStr for Asset {
    type Err = UnknownAsset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_ASSETS
            .iter()
            .copied()
            .find(|asset| asset.ticker().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownAsset(s.to_string()))
    }
}
