//! Hand equity.
//!
//! Monte Carlo win probability of two hole cards on a partial board, either
//! against a known hand or against a uniformly random holding. Traversals do
//! not call this directly: an [`EquityTable`] is built once per deal and the
//! infoset layer reads from it.
//!
//! Simulations run in fixed-size chunks on the rayon pool, each chunk with
//! its own `StdRng` derived from the seed and the cards, so results are
//! reproducible regardless of thread scheduling.

use std::cmp::Ordering;
use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::cards::{Card, Deck};
use crate::engine::{Deal, FLOP, PREFLOP, RIVER, TURN};
use crate::error::{CfrError, CfrResult};
use crate::hand_evaluator::evaluate_hand;

const CHUNK: usize = 256;

pub struct EquityResult {
    pub win: f64,
    pub tie: f64,
    pub lose: f64,
    pub simulations: usize,
}

impl EquityResult {
    pub fn equity(&self) -> f64 {
        self.win + self.tie / 2.0
    }
}

impl fmt::Display for EquityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Win {:.1}% | Tie {:.1}% | Lose {:.1}% (equity: {:.1}%)",
            self.win * 100.0,
            self.tie * 100.0,
            self.lose * 100.0,
            self.equity() * 100.0,
        )
    }
}

// ---------------------------------------------------------------------------
// Provider contract
// ---------------------------------------------------------------------------

/// Scalar win probability in `[0, 1]` for `hole` on `board`.
pub trait EquityProvider: Sync {
    fn equity(&self, hole: &[Card; 2], board: &[Card], iterations: usize) -> CfrResult<f64>;
}

/// Monte Carlo equity against a random opponent holding.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonteCarloEquity {
    pub seed: u64,
}

impl MonteCarloEquity {
    pub fn new(seed: u64) -> Self {
        MonteCarloEquity { seed }
    }
}

impl EquityProvider for MonteCarloEquity {
    fn equity(&self, hole: &[Card; 2], board: &[Card], iterations: usize) -> CfrResult<f64> {
        Ok(equity_vs_random(hole, board, iterations, self.seed)?.equity())
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Mix the seed with the known cards so distinct spots draw distinct streams.
fn spot_seed(seed: u64, known: &[Card]) -> u64 {
    known.iter().fold(seed ^ 0x9E37_79B9_7F4A_7C15, |acc, c| {
        acc.wrapping_mul(53).wrapping_add(c.index() as u64 + 1)
    })
}

fn simulate(
    hero: &[Card; 2],
    villain: Option<&[Card; 2]>,
    board: &[Card],
    simulations: usize,
    seed: u64,
) -> CfrResult<EquityResult> {
    if board.len() > 5 {
        return Err(CfrError::InvalidBoardNotation(format!(
            "board has {} cards",
            board.len()
        )));
    }
    if simulations == 0 {
        return Err(CfrError::InvalidConfig(
            "equity needs at least one simulation".to_string(),
        ));
    }

    let mut dead: Vec<Card> = hero.to_vec();
    if let Some(v) = villain {
        dead.extend_from_slice(v);
    }
    dead.extend_from_slice(board);
    let remaining = Deck::without(&dead).cards;
    let runout_len = 5 - board.len();
    let draw = runout_len + if villain.is_some() { 0 } else { 2 };
    if remaining.len() < draw {
        return Err(CfrError::NotEnoughDeck {
            requested: draw,
            available: remaining.len(),
        });
    }

    let base_seed = spot_seed(seed, &dead);
    let chunks = simulations.div_ceil(CHUNK);

    let results: Vec<(u64, u64, u64)> = (0..chunks)
        .into_par_iter()
        .map(|chunk| -> CfrResult<(u64, u64, u64)> {
            let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(chunk as u64));
            let mut deck = remaining.clone();
            let mut full_board: Vec<Card> = Vec::with_capacity(5);
            let n = CHUNK.min(simulations - chunk * CHUNK);
            let (mut wins, mut ties, mut losses) = (0u64, 0u64, 0u64);

            for _ in 0..n {
                let (drawn, _) = deck.partial_shuffle(&mut rng, draw);
                full_board.clear();
                full_board.extend_from_slice(board);
                full_board.extend_from_slice(&drawn[..runout_len]);
                let opponent = match villain {
                    Some(v) => *v,
                    None => [drawn[runout_len], drawn[runout_len + 1]],
                };

                let r1 = evaluate_hand(hero, &full_board)?;
                let r2 = evaluate_hand(&opponent, &full_board)?;
                match r1.cmp(&r2) {
                    Ordering::Greater => wins += 1,
                    Ordering::Equal => ties += 1,
                    Ordering::Less => losses += 1,
                }
            }
            Ok((wins, ties, losses))
        })
        .collect::<CfrResult<Vec<_>>>()?;

    let (wins, ties, losses) = results
        .iter()
        .fold((0u64, 0u64, 0u64), |acc, &(w, t, l)| {
            (acc.0 + w, acc.1 + t, acc.2 + l)
        });

    let total = (wins + ties + losses) as f64;
    Ok(EquityResult {
        win: wins as f64 / total,
        tie: ties as f64 / total,
        lose: losses as f64 / total,
        simulations: total as usize,
    })
}

/// Equity of `hero` against a known `villain` hand.
pub fn equity_vs_hand(
    hero: &[Card; 2],
    villain: &[Card; 2],
    board: &[Card],
    simulations: usize,
    seed: u64,
) -> CfrResult<EquityResult> {
    simulate(hero, Some(villain), board, simulations, seed)
}

/// Equity of `hero` against a uniformly random holding from the live deck.
pub fn equity_vs_random(
    hero: &[Card; 2],
    board: &[Card],
    simulations: usize,
    seed: u64,
) -> CfrResult<EquityResult> {
    simulate(hero, None, board, simulations, seed)
}

// ---------------------------------------------------------------------------
// Per-deal table
// ---------------------------------------------------------------------------

/// Equity of each player on each street of one deal, indexed by street index.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EquityTable {
    values: [[f64; 4]; 2],
}

impl EquityTable {
    pub fn from_values(values: [[f64; 4]; 2]) -> Self {
        EquityTable { values }
    }

    /// Evaluate both players on every street of `deal`.
    pub fn precompute(
        deal: &Deal,
        provider: &dyn EquityProvider,
        iterations: &[usize; 4],
    ) -> CfrResult<Self> {
        let mut values = [[0.0; 4]; 2];
        for (player, row) in values.iter_mut().enumerate() {
            let hole = &deal.hands()[player];
            for (idx, street) in [PREFLOP, FLOP, TURN, RIVER].into_iter().enumerate() {
                row[idx] = provider.equity(hole, deal.board(street), iterations[idx])?;
            }
        }
        Ok(EquityTable { values })
    }

    pub fn get(&self, player: usize, street_index: usize) -> f64 {
        self.values[player][street_index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::parse_board;

    #[test]
    fn spot_seed_depends_on_cards() {
        let a = parse_board("AsKs").unwrap();
        let b = parse_board("AsKd").unwrap();
        assert_ne!(spot_seed(1, &a), spot_seed(1, &b));
        assert_eq!(spot_seed(1, &a), spot_seed(1, &a));
    }
}
