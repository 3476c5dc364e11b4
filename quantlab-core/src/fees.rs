//! Exchange fee and slippage tables.
//!
//! Rates are percentages of notional per side at the standard (non-VIP)
//! tier. Unknown exchanges fall back to a 0.05% taker fee and CEX slippage.

use serde::{Deserialize, Serialize};

/// Fallback fee for exchanges missing from the table.
pub const DEFAULT_FEE_PCT: f64 = 0.05;

/// Kind of trading venue. Determines default slippage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VenueKind {
    Cex,
    Dex,
    DexPerp,
    Traditional,
    Simulated,
}

impl VenueKind {
    /// Default slippage for this kind of venue, in percent.
    pub fn default_slippage_pct(self) -> f64 {
        match self {
            VenueKind::Cex => 0.01,
            VenueKind::Dex => 0.10,
            VenueKind::DexPerp => 0.03,
            VenueKind::Traditional => 0.01,
            VenueKind::Simulated => 0.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            VenueKind::Cex => "CEX",
            VenueKind::Dex => "DEX",
            VenueKind::DexPerp => "DEX-Perp",
            VenueKind::Traditional => "Traditional",
            VenueKind::Simulated => "Simulated",
        }
    }
}

/// Maker or taker side of the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Maker,
    #[default]
    Taker,
}

/// One row of the fee table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExchangeFees {
    pub id: &'static str,
    pub name: &'static str,
    pub kind: VenueKind,
    pub maker_pct: f64,
    pub taker_pct: f64,
    /// Tax charged on the sell side only (e.g. securities transaction tax).
    pub sell_tax_pct: f64,
}

impl ExchangeFees {
    pub fn rate(&self, order_type: OrderType) -> f64 {
        match order_type {
            OrderType::Maker => self.maker_pct,
            OrderType::Taker => self.taker_pct,
        }
    }
}

const fn row(
    id: &'static str,
    name: &'static str,
    kind: VenueKind,
    maker_pct: f64,
    taker_pct: f64,
) -> ExchangeFees {
    ExchangeFees {
        id,
        name,
        kind,
        maker_pct,
        taker_pct,
        sell_tax_pct: 0.0,
    }
}

use VenueKind::{Cex, Dex, DexPerp, Simulated, Traditional};

/// Standard-tier fees, perpetual contracts where the venue offers them.
pub const EXCHANGE_FEES: &[ExchangeFees] = &[
    // ─── Centralized ───
    row("binance", "Binance", Cex, 0.02, 0.04),
    row("bybit", "Bybit", Cex, 0.02, 0.055),
    row("okx", "OKX", Cex, 0.02, 0.05),
    row("bitget", "Bitget", Cex, 0.02, 0.06),
    row("gate", "Gate.io", Cex, 0.015, 0.05),
    row("kucoin", "KuCoin", Cex, 0.02, 0.06),
    row("mexc", "MEXC", Cex, 0.0, 0.03),
    row("htx", "HTX", Cex, 0.02, 0.05),
    row("bingx", "BingX", Cex, 0.02, 0.05),
    row("woo", "WOO X", Cex, 0.0, 0.03),
    row("cryptocom", "Crypto.com", Cex, 0.075, 0.075),
    // ─── Decentralized (pool fee, gas excluded) ───
    row("uniswap", "Uniswap V3", Dex, 0.30, 0.30),
    row("uniswap_001", "Uniswap 0.01% pool", Dex, 0.01, 0.01),
    row("uniswap_005", "Uniswap 0.05% pool", Dex, 0.05, 0.05),
    row("uniswap_100", "Uniswap 1% pool", Dex, 1.00, 1.00),
    row("sushiswap", "SushiSwap", Dex, 0.30, 0.30),
    row("pancakeswap", "PancakeSwap", Dex, 0.25, 0.25),
    row("curve", "Curve Finance", Dex, 0.04, 0.04),
    row("gmx", "GMX", DexPerp, 0.05, 0.07),
    row("dydx", "dYdX", DexPerp, 0.02, 0.05),
    row("hyperliquid", "Hyperliquid", DexPerp, 0.01, 0.035),
    row("jupiter", "Jupiter (Solana)", Dex, 0.20, 0.20),
    row("raydium", "Raydium (Solana)", Dex, 0.25, 0.25),
    // ─── Traditional ───
    row("yfinance", "Yahoo Finance (simulated)", Simulated, 0.0, 0.0),
    row("us_broker", "US broker (zero commission)", Traditional, 0.0, 0.0),
    ExchangeFees {
        id: "tw_broker",
        name: "Taiwan broker",
        kind: Traditional,
        maker_pct: 0.1425,
        taker_pct: 0.1425,
        sell_tax_pct: 0.30,
    },
    row("futures_broker", "Futures broker", Traditional, 0.01, 0.01),
];

/// Look up an exchange by id.
pub fn exchange(id: &str) -> Option<&'static ExchangeFees> {
    EXCHANGE_FEES.iter().find(|e| e.id == id)
}

/// Fee rate in percent. Unknown exchanges get [`DEFAULT_FEE_PCT`].
pub fn fee_rate(exchange_id: &str, order_type: OrderType) -> f64 {
    exchange(exchange_id).map_or(DEFAULT_FEE_PCT, |e| e.rate(order_type))
}

/// Sell-side tax in percent; 0 for most venues.
pub fn sell_tax(exchange_id: &str) -> f64 {
    exchange(exchange_id).map_or(0.0, |e| e.sell_tax_pct)
}

/// Default slippage in percent. Unknown exchanges are treated as CEX.
pub fn slippage(exchange_id: &str) -> f64 {
    exchange(exchange_id)
        .map_or(VenueKind::Cex, |e| e.kind)
        .default_slippage_pct()
}

/// One-side trading cost in percent: fee plus optional slippage.
pub fn total_cost(exchange_id: &str, order_type: OrderType, include_slippage: bool) -> f64 {
    let slip = if include_slippage {
        slippage(exchange_id)
    } else {
        0.0
    };
    fee_rate(exchange_id, order_type) + slip
}

/// Exchanges grouped by venue kind, table order within each group.
pub fn exchanges_by_kind() -> Vec<(VenueKind, Vec<&'static ExchangeFees>)> {
    let mut groups: Vec<(VenueKind, Vec<&'static ExchangeFees>)> = Vec::new();
    for fees in EXCHANGE_FEES {
        match groups.iter_mut().find(|(kind, _)| *kind == fees.kind) {
            Some((_, members)) => members.push(fees),
            None => groups.push((fees.kind, vec![fees])),
        }
    }
    groups
}
