//! Draw engine: pure wager computation
//!
//! Generates a draw, compares it against a validated selection and derives
//! the payout. No I/O and no shared mutable state; given an injected draw the
//! result is fully deterministic, which is what the unit tests rely on.

use crate::{
    errors::WagerError,
    payout::{self, DRAW_SIZE, MAX_SELECTION, POOL_SIZE},
};
use rand::{rngs::StdRng, seq::index, Rng, SeedableRng};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Round to the fixed 8-fraction-digit precision used for every monetary
/// value in the engine. Half-way cases round to even so replaying a stored
/// multiplier and stake always reproduces the stored profit.
pub(crate) fn round8(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(8, RoundingStrategy::MidpointNearestEven)
}

/// A player's validated pick: 1..=10 distinct numbers in 1..=40.
///
/// Construction is the only validation point; once a `Selection` exists the
/// invariants hold for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection(Vec<u8>);

impl Selection {
    pub fn new(numbers: &[u8]) -> Result<Self, WagerError> {
        if numbers.is_empty() || numbers.len() > MAX_SELECTION {
            return Err(WagerError::InvalidSelection(format!(
                "expected 1 to {} numbers, got {}",
                MAX_SELECTION,
                numbers.len()
            )));
        }
        let mut seen = [false; POOL_SIZE + 1];
        for &n in numbers {
            if n == 0 || n as usize > POOL_SIZE {
                return Err(WagerError::InvalidSelection(format!(
                    "number {} is outside 1..={}",
                    n, POOL_SIZE
                )));
            }
            if seen[n as usize] {
                return Err(WagerError::InvalidSelection(format!(
                    "duplicate number {}",
                    n
                )));
            }
            seen[n as usize] = true;
        }
        Ok(Selection(numbers.to_vec()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn numbers(&self) -> &[u8] {
        &self.0
    }
}

/// The ten winning numbers of one settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draw([u8; DRAW_SIZE]);

impl Draw {
    /// Sample a uniform 10-subset of 1..=40.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let mut numbers = [0u8; DRAW_SIZE];
        for (slot, idx) in numbers.iter_mut().zip(index::sample(rng, POOL_SIZE, DRAW_SIZE).iter()) {
            *slot = idx as u8 + 1;
        }
        Draw(numbers)
    }

    /// Build a draw from explicit numbers, enforcing the draw invariants.
    /// Used to inject fixed draws into the engine.
    pub fn from_numbers(numbers: [u8; DRAW_SIZE]) -> Result<Self, WagerError> {
        let mut seen = [false; POOL_SIZE + 1];
        for &n in &numbers {
            if n == 0 || n as usize > POOL_SIZE {
                return Err(WagerError::Internal(format!(
                    "draw number {} is outside 1..={}",
                    n, POOL_SIZE
                )));
            }
            if seen[n as usize] {
                return Err(WagerError::Internal(format!("duplicate draw number {}", n)));
            }
            seen[n as usize] = true;
        }
        Ok(Draw(numbers))
    }

    pub fn numbers(&self) -> &[u8; DRAW_SIZE] {
        &self.0
    }

    pub fn contains(&self, n: u8) -> bool {
        self.0.contains(&n)
    }
}

/// Everything a settled wager derives: match count, table multiplier, net
/// profit and the draw itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub match_count: usize,
    pub multiplier: Decimal,
    pub profit: Decimal,
    pub draw: Draw,
}

/// Source of fresh draws, the engine's only nondeterministic input.
pub trait DrawSource: Send + Sync {
    fn draw(&self) -> Draw;
}

/// Production draw source.
///
/// Seeding policy: a `StdRng` (ChaCha-based) seeded from OS entropy per
/// draw. This deliberately stays decoupled from any key-management concern;
/// a PRNG seeded through wallet key derivation buys nothing here.
pub struct EntropyDrawSource;

impl DrawSource for EntropyDrawSource {
    fn draw(&self) -> Draw {
        let mut rng = StdRng::from_entropy();
        Draw::random(&mut rng)
    }
}

/// A draw source that always returns the same draw. Lets tests and the
/// simulator pin the outcome of the full pipeline.
pub struct FixedDrawSource(pub Draw);

impl DrawSource for FixedDrawSource {
    fn draw(&self) -> Draw {
        self.0
    }
}

/// The draw engine: payout computation plus stake validation against the
/// externally supplied per-currency minimum table.
pub struct DrawEngine {
    source: Arc<dyn DrawSource>,
    minimum_stakes: HashMap<String, Decimal>,
}

impl DrawEngine {
    pub fn new(source: Arc<dyn DrawSource>, minimum_stakes: HashMap<String, Decimal>) -> Self {
        Self {
            source,
            minimum_stakes,
        }
    }

    /// Cheap synchronous stake check, usable on the admission path before a
    /// wager ever occupies a queue slot.
    pub fn validate_stake(&self, stake: Decimal, currency: &str) -> Result<(), WagerError> {
        let minimum = self.minimum_stakes.get(currency).ok_or_else(|| {
            WagerError::InvalidSelection(format!("unsupported currency \"{}\"", currency))
        })?;
        if stake < *minimum {
            return Err(WagerError::BelowMinimumStake {
                currency: currency.to_string(),
                stake,
                minimum: *minimum,
            });
        }
        Ok(())
    }

    /// Validate, generate a fresh draw and settle.
    pub fn settle(
        &self,
        selection: &Selection,
        stake: Decimal,
        currency: &str,
    ) -> Result<SettlementOutcome, WagerError> {
        self.validate_stake(stake, currency)?;
        self.settle_with_draw(selection, stake, self.source.draw())
    }

    /// Settle against an injected draw. Pure: same inputs, same outcome.
    pub fn settle_with_draw(
        &self,
        selection: &Selection,
        stake: Decimal,
        draw: Draw,
    ) -> Result<SettlementOutcome, WagerError> {
        let match_count = selection
            .numbers()
            .iter()
            .filter(|&&n| draw.contains(n))
            .count();
        // Selection invariants guarantee a table row exists; a miss here
        // means the table itself is malformed.
        let multiplier = payout::multiplier(selection.len(), match_count).ok_or_else(|| {
            WagerError::InvalidSelection(format!(
                "no payout row for selection size {}",
                selection.len()
            ))
        })?;
        let profit = round8(stake * multiplier - stake);
        Ok(SettlementOutcome {
            match_count,
            multiplier,
            profit,
            draw,
        })
    }
}
