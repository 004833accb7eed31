//! Ledger store: transactional balance mutation and settlement history
//!
//! The ledger owns account balances. A commit is atomic: the account row is
//! locked, the balance is checked against the stake, the profit is applied
//! and the history row appended, all before the lock is released. No partial
//! state (history without a balance update, or vice versa) is ever
//! observable, and a committed balance is never negative.

use crate::{
    draw::{round8, Draw, SettlementOutcome},
    errors::LedgerError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Account identifier. Ordered so multi-account operations can take row
/// locks in a single global order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Append-only settlement record. Written once inside a commit, never
/// updated or deleted.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRecord {
    pub id: u64,
    pub account: AccountId,
    pub stake: Decimal,
    pub multiplier: Decimal,
    pub profit: Decimal,
    pub match_count: usize,
    pub draw: Draw,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// The seam to the persistence backend. The in-process implementation below
/// is what the tests and the dev server run against; a database-backed
/// implementation must honor the same all-or-nothing commit contract.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Settle one wager against an account, atomically:
    /// check `balance >= stake`, apply the (already stake-netting) profit,
    /// append the history row. On `InsufficientFunds` nothing is written.
    async fn commit(
        &self,
        account: AccountId,
        stake: Decimal,
        currency: &str,
        outcome: &SettlementOutcome,
    ) -> Result<HistoryRecord, LedgerError>;

    async fn balance(&self, account: AccountId) -> Result<Decimal, LedgerError>;

    /// External top-up path. Creates the account on first deposit and
    /// returns the new balance.
    async fn deposit(&self, account: AccountId, amount: Decimal) -> Result<Decimal, LedgerError>;

    /// Settlement history, newest first. `before` pages backwards through
    /// record ids; an exhausted cursor falls back to the latest page so
    /// clients polling with a stale cursor still see data.
    async fn history_page(
        &self,
        before: Option<u64>,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, LedgerError>;
}

/// In-process ledger with per-account async mutex rows.
pub struct MemoryLedger {
    accounts: DashMap<AccountId, Arc<Mutex<Decimal>>>,
    history: Mutex<Vec<HistoryRecord>>,
    next_history_id: AtomicU64,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            history: Mutex::new(Vec::new()),
            next_history_id: AtomicU64::new(1),
        }
    }

    fn row(&self, account: AccountId) -> Result<Arc<Mutex<Decimal>>, LedgerError> {
        self.accounts
            .get(&account)
            .map(|entry| entry.value().clone())
            .ok_or(LedgerError::UnknownAccount(account))
    }

    /// Lock account rows in ascending id order. All code paths that ever
    /// hold more than one row lock must come through here so concurrent
    /// multi-account commits cannot deadlock.
    async fn lock_rows(
        &self,
        accounts: &[AccountId],
    ) -> Result<Vec<OwnedMutexGuard<Decimal>>, LedgerError> {
        let mut ordered: Vec<AccountId> = accounts.to_vec();
        ordered.sort_unstable();
        ordered.dedup();
        let mut guards = Vec::with_capacity(ordered.len());
        for id in ordered {
            let row = self.row(id)?;
            guards.push(row.lock_owned().await);
        }
        Ok(guards)
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn commit(
        &self,
        account: AccountId,
        stake: Decimal,
        currency: &str,
        outcome: &SettlementOutcome,
    ) -> Result<HistoryRecord, LedgerError> {
        if stake <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(stake));
        }
        let mut guards = self.lock_rows(&[account]).await?;
        let balance = &mut *guards[0];
        if *balance < stake {
            // abort before anything is written: no balance change, no history
            return Err(LedgerError::InsufficientFunds {
                balance: *balance,
                stake,
            });
        }

        // profit already nets the stake: the worst case (total loss) is
        // -stake, which the check above guarantees the balance can absorb
        let new_balance = round8(*balance + outcome.profit);
        let record = HistoryRecord {
            id: self.next_history_id.fetch_add(1, Ordering::SeqCst),
            account,
            stake,
            multiplier: outcome.multiplier,
            profit: outcome.profit,
            match_count: outcome.match_count,
            draw: outcome.draw,
            currency: currency.to_string(),
            created_at: Utc::now(),
        };

        // balance update and history append both happen under the row lock
        self.history.lock().await.push(record.clone());
        *balance = new_balance;
        Ok(record)
    }

    async fn balance(&self, account: AccountId) -> Result<Decimal, LedgerError> {
        let row = self.row(account)?;
        let balance = row.lock().await;
        Ok(*balance)
    }

    async fn deposit(&self, account: AccountId, amount: Decimal) -> Result<Decimal, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let row = self
            .accounts
            .entry(account)
            .or_insert_with(|| Arc::new(Mutex::new(Decimal::ZERO)))
            .value()
            .clone();
        let mut balance = row.lock().await;
        *balance = round8(*balance + amount);
        Ok(*balance)
    }

    async fn history_page(
        &self,
        before: Option<u64>,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, LedgerError> {
        let history = self.history.lock().await;
        let mut page: Vec<HistoryRecord> = match before {
            Some(cursor) => history
                .iter()
                .rev()
                .filter(|r| r.id < cursor)
                .take(limit)
                .cloned()
                .collect(),
            None => history.iter().rev().take(limit).cloned().collect(),
        };
        if page.is_empty() && before.is_some() {
            page = history.iter().rev().take(limit).cloned().collect();
        }
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::Draw;
    use rust_decimal_macros::dec;

    fn outcome(profit: Decimal, multiplier: Decimal) -> SettlementOutcome {
        SettlementOutcome {
            match_count: 2,
            multiplier,
            profit,
            draw: Draw::from_numbers([1, 2, 3, 4, 5, 6, 7, 8, 9, 10]).unwrap(),
        }
    }

    #[tokio::test]
    async fn deposit_creates_account_and_accumulates() {
        let ledger = MemoryLedger::new();
        assert_eq!(ledger.deposit(AccountId(1), dec!(10)).await.unwrap(), dec!(10));
        assert_eq!(ledger.deposit(AccountId(1), dec!(2.5)).await.unwrap(), dec!(12.5));
        assert_eq!(ledger.balance(AccountId(1)).await.unwrap(), dec!(12.5));
        assert!(ledger.deposit(AccountId(1), dec!(0)).await.is_err());
    }

    #[tokio::test]
    async fn commit_applies_profit_and_appends_history() {
        let ledger = MemoryLedger::new();
        ledger.deposit(AccountId(7), dec!(100)).await.unwrap();

        let win = outcome(dec!(4), dec!(1.4));
        let record = ledger
            .commit(AccountId(7), dec!(10), "USDT", &win)
            .await
            .unwrap();
        assert_eq!(record.profit, dec!(4));
        assert_eq!(ledger.balance(AccountId(7)).await.unwrap(), dec!(104));

        let loss = outcome(dec!(-10), Decimal::ZERO);
        ledger
            .commit(AccountId(7), dec!(10), "USDT", &loss)
            .await
            .unwrap();
        assert_eq!(ledger.balance(AccountId(7)).await.unwrap(), dec!(94));

        let page = ledger.history_page(None, 20).await.unwrap();
        assert_eq!(page.len(), 2);
        // newest first
        assert!(page[0].id > page[1].id);
    }

    #[tokio::test]
    async fn insufficient_funds_leaves_no_trace() {
        let ledger = MemoryLedger::new();
        ledger.deposit(AccountId(3), dec!(3)).await.unwrap();

        let err = ledger
            .commit(AccountId(3), dec!(5), "USDT", &outcome(dec!(2), dec!(1.4)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(ledger.balance(AccountId(3)).await.unwrap(), dec!(3));
        assert!(ledger.history_page(None, 20).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_account_cannot_commit() {
        let ledger = MemoryLedger::new();
        let err = ledger
            .commit(AccountId(99), dec!(1), "ETH", &outcome(dec!(1), dec!(2)))
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::UnknownAccount(AccountId(99)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_commits_never_lose_an_update() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.deposit(AccountId(1), dec!(1000)).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..40u32 {
            let ledger = ledger.clone();
            // alternate +4 wins and -10 losses
            let result = if i % 2 == 0 {
                outcome(dec!(4), dec!(1.4))
            } else {
                outcome(dec!(-10), Decimal::ZERO)
            };
            handles.push(tokio::spawn(async move {
                ledger.commit(AccountId(1), dec!(10), "USDT", &result).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // 20 wins of +4 and 20 losses of -10
        assert_eq!(
            ledger.balance(AccountId(1)).await.unwrap(),
            dec!(1000) + dec!(80) - dec!(200)
        );
        assert_eq!(ledger.history_page(None, 50).await.unwrap().len(), 40);
    }

    #[tokio::test]
    async fn history_cursor_pages_backwards_and_falls_back() {
        let ledger = MemoryLedger::new();
        ledger.deposit(AccountId(1), dec!(1000)).await.unwrap();
        for _ in 0..5 {
            ledger
                .commit(AccountId(1), dec!(1), "USDT", &outcome(dec!(-1), Decimal::ZERO))
                .await
                .unwrap();
        }

        let first = ledger.history_page(None, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        let next = ledger
            .history_page(Some(first[1].id), 2)
            .await
            .unwrap();
        assert_eq!(next.len(), 2);
        assert!(next[0].id < first[1].id);

        // exhausted cursor falls back to the latest page
        let fallback = ledger.history_page(Some(1), 2).await.unwrap();
        assert_eq!(fallback.len(), 2);
        assert_eq!(fallback[0].id, first[0].id);
    }
}
