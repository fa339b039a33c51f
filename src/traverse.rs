//! CFR traversal with external sampling.
//!
//! One recursive walk from a dealt root. At the traverse player's decision
//! nodes every legal action is explored and instantaneous regret is written
//! to the caller's [`CfrDeltas`]; at the opponent's nodes a single action is
//! sampled from the current strategy. With sampling disabled the walk covers
//! the full tree, which is how exploitability is measured.
//!
//! Strategies are read through [`StrategyProvider`] from a snapshot that
//! stays fixed for the whole iteration; updates never feed back into reads.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::actions::{ActionMask, ActionMenu, NUM_ACTIONS};
use crate::engine::{street_index, GameNode, RoundState};
use crate::equity::EquityTable;
use crate::infoset::make_infoset;
use crate::strategy::{regret_match, ActionRegrets, RegretMatchedStrategy, StrategyProvider};

/// Everything a traversal needs that does not change between nodes.
pub struct TraversalContext<'a> {
    pub traverse_player: usize,
    pub iteration: usize,
    pub equity: &'a EquityTable,
    /// Strategy read at each player's decision nodes.
    pub strategies: [&'a dyn StrategyProvider; 2],
    pub menu: &'a ActionMenu,
    pub allow_updates: bool,
    pub external_sampling: bool,
}

/// Values of one subtree, from both players' perspectives.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TreeNodeInfo {
    pub strategy_ev: [f64; 2],
    pub best_response_ev: [f64; 2],
    pub exploitability: [f64; 2],
    /// Decision nodes visited in this subtree.
    pub nodes: usize,
}

impl TreeNodeInfo {
    fn terminal(deltas: [i32; 2]) -> Self {
        let ev = [deltas[0] as f64, deltas[1] as f64];
        TreeNodeInfo {
            strategy_ev: ev,
            best_response_ev: ev,
            exploitability: [0.0, 0.0],
            nodes: 0,
        }
    }

    pub fn total_exploitability(&self) -> f64 {
        self.exploitability[0] + self.exploitability[1]
    }
}

/// Regret and average-strategy increments collected by one worker.
#[derive(Debug, Clone, Default)]
pub struct CfrDeltas {
    pub regrets: [RegretMatchedStrategy; 2],
    pub avg_strategy: RegretMatchedStrategy,
}

impl CfrDeltas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.regrets.iter().all(RegretMatchedStrategy::is_empty) && self.avg_strategy.is_empty()
    }
}

/// Exploitability in milli-big-blinds per game.
pub fn exploitability_mbb(total: f64, small_blind: u32) -> f64 {
    1000.0 * total / (2.0 * small_blind as f64)
}

/// Restrict a provider's output to the legal slots and renormalize. Anything
/// without positive legal mass becomes uniform over the mask.
pub fn masked_policy(probs: &ActionRegrets, mask: &ActionMask) -> ActionRegrets {
    regret_match(probs, mask, 0.0)
}

/// Draw a legal slot from a masked policy.
fn sample_slot<R: Rng + ?Sized>(probs: &ActionRegrets, mask: &ActionMask, rng: &mut R) -> usize {
    let legal: Vec<usize> = mask.legal_slots().collect();
    match WeightedIndex::new(legal.iter().map(|&slot| probs[slot])) {
        Ok(dist) => legal[dist.sample(rng)],
        Err(_) => legal[rng.gen_range(0..legal.len())],
    }
}

/// Walk the subtree under `node`.
///
/// `reach` holds each player's own probability of reaching `node`. Sampled
/// nodes pass it through unchanged since the draw already accounts for it.
pub fn traverse<R: Rng + ?Sized>(
    node: &GameNode,
    ctx: &TraversalContext<'_>,
    reach: [f64; 2],
    deltas: &mut CfrDeltas,
    rng: &mut R,
) -> TreeNodeInfo {
    match node {
        GameNode::Terminal(terminal) => TreeNodeInfo::terminal(terminal.deltas),
        GameNode::Round(state) => traverse_decision(state, ctx, reach, deltas, rng),
    }
}

fn traverse_decision<R: Rng + ?Sized>(
    state: &RoundState,
    ctx: &TraversalContext<'_>,
    reach: [f64; 2],
    deltas: &mut CfrDeltas,
    rng: &mut R,
) -> TreeNodeInfo {
    let active = state.active_player();
    let other = 1 - active;

    let (actions, mask) = ctx.menu.make_actions(state);
    let infoset = make_infoset(
        state,
        active,
        ctx.equity.get(active, street_index(state.street)),
        ctx.menu.max_actions_per_street,
    );

    let provider = ctx.strategies[active];
    let raw = if ctx.iteration == 0 {
        provider.get_strategy_uniform(&mask)
    } else {
        provider.get_strategy(&infoset, &mask)
    };
    let probs = masked_policy(&raw, &mask);

    if ctx.external_sampling && active != ctx.traverse_player {
        let slot = sample_slot(&probs, &mask, rng);
        let child = state.proceed(actions[slot]);
        let mut info = traverse(&child, ctx, reach, deltas, rng);
        info.nodes += 1;
        return info;
    }

    let mut action_values = [[0.0; NUM_ACTIONS]; 2];
    let mut br_values = [[0.0; NUM_ACTIONS]; 2];
    let mut nodes = 1;

    for slot in mask.legal_slots() {
        let mut child_reach = reach;
        child_reach[active] *= probs[slot];
        let child = state.proceed(actions[slot]);
        let info = traverse(&child, ctx, child_reach, deltas, rng);
        nodes += info.nodes;
        for p in 0..2 {
            action_values[p][slot] = info.strategy_ev[p];
            br_values[p][slot] = info.best_response_ev[p];
        }
    }

    let mut strategy_ev = [0.0; 2];
    for (p, ev) in strategy_ev.iter_mut().enumerate() {
        *ev = mask
            .legal_slots()
            .map(|slot| probs[slot] * action_values[p][slot])
            .sum();
    }

    let mut best_response_ev = [0.0; 2];
    best_response_ev[active] = mask
        .legal_slots()
        .map(|slot| br_values[active][slot])
        .fold(f64::NEG_INFINITY, f64::max);
    best_response_ev[other] = mask
        .legal_slots()
        .map(|slot| probs[slot] * br_values[other][slot])
        .sum();

    let exploitability = [
        best_response_ev[0] - strategy_ev[0],
        best_response_ev[1] - strategy_ev[1],
    ];

    if ctx.allow_updates && active == ctx.traverse_player {
        let key = infoset.bucket_key();
        let mut instant_regret = [0.0; NUM_ACTIONS];
        for slot in mask.legal_slots() {
            instant_regret[slot] = reach[other] * (action_values[active][slot] - strategy_ev[active]);
        }
        let weighted_strategy = probs.map(|p| reach[active] * p);
        deltas.regrets[active].add_regret_key(&key, &instant_regret);
        deltas.avg_strategy.add_regret_key(&key, &weighted_strategy);
    }

    TreeNodeInfo {
        strategy_ev,
        best_response_ev,
        exploitability,
        nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mbb_uses_small_blind() {
        assert_relative_eq!(exploitability_mbb(0.5, 1), 250.0);
        assert_relative_eq!(exploitability_mbb(2.0, 5), 200.0);
    }

    #[test]
    fn sampling_never_picks_zero_weight() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;
        let probs = [0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
        let mask = ActionMask([true, true, true, false, false, false]);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            assert_eq!(sample_slot(&probs, &mask, &mut rng), 2);
        }
    }

    #[test]
    fn masked_policy_drops_illegal_mass() {
        let mask = ActionMask([true, true, false, true, false, false]);
        assert_eq!(
            masked_policy(&[0.0, 0.0, 1.0, 0.0, 0.0, 0.0], &mask),
            [1.0 / 3.0, 1.0 / 3.0, 0.0, 1.0 / 3.0, 0.0, 0.0]
        );
        let p = masked_policy(&[0.2, 0.2, 0.6, 0.0, 0.0, 0.0], &mask);
        assert_relative_eq!(p[0], 0.5);
        assert_relative_eq!(p[1], 0.5);
        assert_eq!(p[2], 0.0);
    }
}
