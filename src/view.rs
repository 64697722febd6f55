use crate::{
    asset::{
        ALL_ASSETS,
        Asset,
    },
    model::{
        SequenceNumber,
        SpinResult,
        WinnerEvent,
    },
    session::SessionContext,
};
use fuels::types::Identity;
use itertools::Itertools;
use unicode_width::UnicodeWidthStr;

pub const RECENT_LIMIT: usize = 5;
pub const PLACEHOLDER: &str = "...";

/// Newest `RECENT_LIMIT` items of a chain-ordered log, newest first.
pub fn recent<'a, T: 'a>(log: impl DoubleEndedIterator<Item = &'a T>) -> Vec<&'a T> {
    log.rev().take(RECENT_LIMIT).collect()
}

pub fn recent_spins<'a>(
    completions: impl DoubleEndedIterator<Item = &'a SpinResult>,
    player: Option<&Identity>,
) -> Vec<&'a SpinResult> {
    let Some(player) = player else {
        return Vec::new();
    };
    recent(completions.filter(|c| c.player == *player))
}

pub fn recent_winners<'a>(
    winners: impl DoubleEndedIterator<Item = &'a WinnerEvent>,
) -> Vec<&'a WinnerEvent> {
    recent(winners)
}

pub fn user_entries(whitelist: &[Identity], player: Option<&Identity>) -> usize {
    player.map_or(0, |player| {
        whitelist.iter().filter(|entry| *entry == player).count()
    })
}

pub fn format_amount(amount: u64, decimals: u32) -> String {
    let one_unit = 10u64.saturating_pow(decimals);
    let whole = amount / one_unit;
    let fractional = amount % one_unit;
    if fractional == 0 {
        format!("{}", whole)
    } else {
        format!(
            "{}.{}",
            whole,
            format!("{:0width$}", fractional, width = decimals as usize)
                .trim_end_matches('0')
        )
    }
}

pub fn format_value(amount: u64, session: &SessionContext) -> String {
    format!("{} {}", format_amount(amount, session.decimals), session.symbol)
}

/// Read-backed figure, "..." while unknown.
pub fn format_reading(amount: Option<u64>, session: &SessionContext) -> String {
    amount.map_or_else(|| PLACEHOLDER.to_string(), |a| format_value(a, session))
}

pub fn format_pool(amount: Option<u64>, session: &SessionContext) -> String {
    format_value(amount.unwrap_or_default(), session)
}

pub fn format_prize(prize: Option<u64>, session: &SessionContext) -> String {
    prize.map_or_else(|| "N/A".to_string(), |p| format_value(p, session))
}

fn identity_bytes(identity: &Identity) -> &[u8] {
    match identity {
        Identity::Address(address) => &address[..],
        Identity::ContractId(contract_id) => &contract_id[..],
    }
}

pub fn full_address(identity: &Identity) -> String {
    format!("0x{}", hex::encode(identity_bytes(identity)))
}

/// `0x` plus the first and last four hex digits.
pub fn short_address(identity: &Identity) -> String {
    let hex = hex::encode(identity_bytes(identity));
    format!("0x{}...{}", &hex[..4], &hex[hex.len() - 4..])
}

pub fn spin_button_label(
    connected: bool,
    busy: bool,
    selected: Option<Asset>,
) -> &'static str {
    if !connected {
        "Connect Wallet"
    } else if busy {
        "Spinning..."
    } else if selected.is_none() {
        "Select an asset"
    } else {
        "SPIN!"
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultBanner {
    pub headline: &'static str,
    pub detail: String,
    pub lottery_note: Option<&'static str>,
    pub won: bool,
}

pub fn result_banner(result: &SpinResult) -> ResultBanner {
    let asset = result
        .resolved_asset()
        .map_or_else(|| format!("#{}", result.result_index), |a| a.to_string());
    ResultBanner {
        headline: if result.won { "YOU WON!" } else { "Try Again!" },
        detail: format!("Result: {}", asset),
        lottery_note: result
            .won
            .then_some("You've been added to today's lottery!"),
        won: result.won,
    }
}

pub fn timeout_message(sequence: Option<SequenceNumber>) -> String {
    match sequence {
        Some(sequence) => format!(
            "Spin #{} timed out waiting for the oracle; check recent spins later",
            sequence
        ),
        None => "Spin timed out before its request was seen on chain".to_string(),
    }
}

pub fn eligibility_label(entries: usize) -> &'static str {
    if entries > 0 { "Eligible" } else { "Not Eligible" }
}

pub fn entries_hint(entries: usize) -> &'static str {
    if entries > 0 {
        "Good luck!"
    } else {
        "Win roulette to participate!"
    }
}

/// Asset the decorative wheel shows for an animation frame.
pub fn wheel_highlight(frame: usize) -> Asset {
    ALL_ASSETS[frame % ALL_ASSETS.len()]
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpinRow {
    pub sequence: String,
    pub result: String,
    pub status: &'static str,
    pub won: bool,
}

pub fn spin_rows(spins: &[&SpinResult]) -> Vec<SpinRow> {
    spins
        .iter()
        .map(|spin| SpinRow {
            sequence: format!("#{}", spin.sequence_number),
            result: spin
                .resolved_asset()
                .map_or_else(|| PLACEHOLDER.to_string(), |a| a.to_string()),
            status: if spin.won { "Won" } else { "Lost" },
            won: spin.won,
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WinnerRow {
    pub day: String,
    pub winner: String,
    pub prize: String,
}

pub fn winner_rows(winners: &[&WinnerEvent], session: &SessionContext) -> Vec<WinnerRow> {
    winners
        .iter()
        .map(|w| WinnerRow {
            day: format!("Day {}", w.day),
            winner: short_address(&w.winner),
            prize: format_prize(Some(w.prize), session),
        })
        .collect()
}

pub fn help_line(bindings: &[(&str, &str)]) -> String {
    bindings
        .iter()
        .map(|(key, action)| format!("{key} {action}"))
        .join(" | ")
}

/// Pads `label` on both sides to `width` terminal columns.
pub fn center_label(label: &str, width: usize) -> String {
    let used = label.width();
    if used >= width {
        return label.to_string();
    }
    let left = (width - used) / 2;
    let right = width - used - left;
    format!("{}{}{}", " ".repeat(left), label, " ".repeat(right))
}
