//! Wire models
//!
//! Request and response shapes for the HTTP surface. Monetary values travel
//! as decimal strings; the multiplier is additionally rendered with two
//! fraction digits for display.

use crate::ledger::HistoryRecord;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    /// 1 to 10 distinct numbers in 1..=40.
    pub selection: Vec<u8>,
    pub stake: Decimal,
    pub currency: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlayResponse {
    pub request_id: String,
    pub draw: Vec<u8>,
    pub match_count: usize,
    /// Display multiplier, two fraction digits ("1.40").
    pub multiplier: String,
    pub profit: Decimal,
    pub balance: Decimal,
    pub currency: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub account: u64,
    pub balance: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Page backwards: return records with id strictly below this cursor.
    #[serde(default)]
    pub before: Option<u64>,
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    20
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: u64,
    pub account: u64,
    pub stake: Decimal,
    pub multiplier: String,
    pub profit: Decimal,
    pub match_count: usize,
    pub draw: Vec<u8>,
    pub currency: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<HistoryRecord> for HistoryEntry {
    fn from(record: HistoryRecord) -> Self {
        Self {
            id: record.id,
            account: record.account.0,
            stake: record.stake,
            multiplier: format_multiplier(record.multiplier),
            profit: record.profit,
            match_count: record.match_count,
            draw: record.draw.numbers().to_vec(),
            currency: record.currency,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub records: Vec<HistoryEntry>,
    /// Cursor for the next (older) page, absent when this page is the end.
    pub next_before: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub live_workers: usize,
    pub queue_depth: usize,
}

pub fn format_multiplier(multiplier: Decimal) -> String {
    format!("{:.2}", multiplier)
}
