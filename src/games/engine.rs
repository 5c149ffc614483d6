//! Outcome engine
//!
//! Draws a weighted symbol grid and evaluates it against a paytable.
//! Evaluation is a pure function of (wager, grid, paytable); the only
//! randomness is the draw, which takes an explicit RNG so that a seeded
//! generator reproduces the exact grid later.

use crate::common::{Amount, Multiplier};
use crate::errors::{CatalogError, TransactionFault};
use crate::games::paytable::{Payline, Paytable, REELS, ROWS};
use crate::games::types::{Contribution, ContributionKind, Grid, Outcome};
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;

/// Slot outcome engine bound to one immutable paytable
#[derive(Debug, Clone)]
pub struct OutcomeEngine {
    paytable: Arc<Paytable>,
    distribution: WeightedIndex<u32>,
}

impl OutcomeEngine {
    pub fn new(paytable: Arc<Paytable>) -> Result<Self, CatalogError> {
        let distribution = WeightedIndex::new(paytable.symbols().iter().map(|s| s.weight))
            .map_err(|e| CatalogError::Parse(format!("Invalid symbol weights: {}", e)))?;

        Ok(Self {
            paytable,
            distribution,
        })
    }

    pub fn paytable(&self) -> &Paytable {
        &self.paytable
    }

    pub fn game_id(&self) -> &str {
        self.paytable.game_id()
    }

    /// Draw each row independently, `REELS` weighted draws with replacement
    pub fn draw_grid<R: Rng + ?Sized>(&self, rng: &mut R) -> Grid {
        let symbols = self.paytable.symbols();
        let rows = (0..ROWS)
            .map(|_| {
                (0..REELS)
                    .map(|_| symbols[self.distribution.sample(rng)].name.clone())
                    .collect()
            })
            .collect();

        // Shape is guaranteed by the loops above
        Grid::new(rows).unwrap_or_else(|_| unreachable!("grid drawn with fixed shape"))
    }

    pub fn spin<R: Rng + ?Sized>(
        &self,
        wager: Amount,
        rng: &mut R,
    ) -> Result<Outcome, TransactionFault> {
        let grid = self.draw_grid(rng);
        self.evaluate(wager, grid)
    }

    /// Spin with a ChaCha20 generator seeded from 32 bytes (the VRF output)
    pub fn spin_seeded(&self, wager: Amount, seed: [u8; 32]) -> Result<Outcome, TransactionFault> {
        let mut rng = ChaCha20Rng::from_seed(seed);
        self.spin(wager, &mut rng)
    }

    /// Score a grid: every payline in catalog order, then scatters.
    /// Fails only when a win does not fit in an `Amount`.
    pub fn evaluate(&self, wager: Amount, grid: Grid) -> Result<Outcome, TransactionFault> {
        let mut contributions = Vec::new();
        for (index, line) in self.paytable.paylines().iter().enumerate() {
            contributions.extend(self.evaluate_payline(index, line, wager, &grid)?);
        }

        let (scatter_count, scatter_win) = self.evaluate_scatter(wager, &grid)?;
        contributions.extend(scatter_win);

        let payout = Amount::checked_sum(contributions.iter().map(|c| c.amount))
            .ok_or(TransactionFault::PayoutOverflow { wager })?;

        Ok(Outcome {
            grid,
            payout,
            contributions,
            scatter_count,
        })
    }

    fn evaluate_payline(
        &self,
        index: usize,
        line: &Payline,
        wager: Amount,
        grid: &Grid,
    ) -> Result<Option<Contribution>, TransactionFault> {
        let symbols: Vec<&str> = line.cells().map(|(row, reel)| grid.symbol(row, reel)).collect();
        let Some(&first) = symbols.first() else {
            return Ok(None);
        };

        if first == self.paytable.scatter_symbol() || !self.paytable.has_line_pays(first) {
            return Ok(None);
        }

        let run = symbols.iter().take_while(|&&s| s == first).count() as u8;
        let Some(multiplier) = self.paytable.line_multiplier(first, run) else {
            return Ok(None);
        };

        let line_count = self.paytable.paylines().len() as u64;
        let amount = wager
            .split_and_multiply(line_count, multiplier)
            .ok_or(TransactionFault::PayoutOverflow { wager })?;

        Ok(Some(Contribution {
            kind: ContributionKind::Line {
                payline: index + 1,
                payline_name: line.name.clone(),
                symbol: first.to_string(),
                run,
            },
            multiplier,
            amount,
            description: format!(
                "Line {} ({}): {} x{} pays {} ({})",
                index + 1,
                line.name,
                first,
                run,
                amount,
                multiplier
            ),
        }))
    }

    fn evaluate_scatter(
        &self,
        wager: Amount,
        grid: &Grid,
    ) -> Result<(usize, Option<Contribution>), TransactionFault> {
        let scatter = self.paytable.scatter_symbol();
        let count = grid.count(scatter);

        let Some((threshold, multiplier)) = self.paytable.scatter_multiplier(count) else {
            return Ok((count, None));
        };
        let amount = wager
            .split_and_multiply(1, multiplier)
            .ok_or(TransactionFault::PayoutOverflow { wager })?;

        let contribution = Contribution {
            kind: ContributionKind::Scatter { count, threshold },
            multiplier,
            amount,
            description: format!(
                "Scatter {} x{} pays {} ({})",
                scatter,
                count,
                amount,
                multiplier
            ),
        };
        Ok((count, Some(contribution)))
    }
}

/// Long-run return to player of an engine, by simulation
pub fn simulate_rtp<R: Rng + ?Sized>(
    engine: &OutcomeEngine,
    spins: usize,
    rng: &mut R,
) -> Result<f64, TransactionFault> {
    let wager = Amount::from_major_units(1);
    let mut paid: u128 = 0;
    for _ in 0..spins {
        paid += engine.spin(wager, rng)?.payout.units() as u128;
    }
    Ok(paid as f64 / (wager.units() as u128 * spins.max(1) as u128) as f64)
}

/// Sum of the multipliers of every contribution in an outcome
pub fn multiplier_total(outcome: &Outcome) -> Multiplier {
    Multiplier::from_hundredths(outcome.contributions.iter().map(|c| c.multiplier.hundredths()).sum())
}
