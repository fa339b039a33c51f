//! Action abstraction: the fixed six-slot menu every decision node is
//! projected onto.
//!
//! Slots are `Fold, Call, Check, Raise(f0), Raise(f1), Raise(f2)` where the
//! raise fractions are multiples of the pot after calling. The menu is part
//! of a trained model's identity; changing it invalidates saved tables.

use serde::{Deserialize, Serialize};

use crate::engine::{Action, RoundState, PREFLOP};
use crate::error::{CfrError, CfrResult};

pub const NUM_ACTIONS: usize = 6;

/// Concrete actions for each menu slot. Slots that are masked out still hold
/// their nominal action but must never be played.
pub type ActionVec = [Action; NUM_ACTIONS];

/// Per-slot legality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActionMask(pub [bool; NUM_ACTIONS]);

impl ActionMask {
    pub fn is_legal(&self, slot: usize) -> bool {
        self.0[slot]
    }

    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&b| b).count()
    }

    pub fn legal_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().enumerate().filter(|&(_, &b)| b).map(|(i, _)| i)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionMenu {
    /// Raise sizes as fractions of the pot after calling.
    pub pot_fractions: [f64; 3],
    /// Entries allowed per postflop street; preflop gets two extra for the blinds.
    pub max_actions_per_street: usize,
}

impl Default for ActionMenu {
    fn default() -> Self {
        ActionMenu {
            pot_fractions: [0.5, 1.0, 2.0],
            max_actions_per_street: 4,
        }
    }
}

impl ActionMenu {
    pub fn validate(&self) -> CfrResult<()> {
        // Postflop blocks must start on an even slot so parity tracks the actor.
        if self.max_actions_per_street < 2 || self.max_actions_per_street % 2 != 0 {
            return Err(CfrError::InvalidConfig(format!(
                "max_actions_per_street must be even and at least 2 (got {})",
                self.max_actions_per_street
            )));
        }
        if self.pot_fractions.iter().any(|&f| f <= 0.0 || !f.is_finite()) {
            return Err(CfrError::InvalidConfig(format!(
                "pot fractions must be positive and finite (got {:?})",
                self.pot_fractions
            )));
        }
        Ok(())
    }

    /// Maximum entries on the live street's history, blind posts included.
    pub fn street_cap(&self, street: u8) -> usize {
        if street == PREFLOP {
            self.max_actions_per_street + 2
        } else {
            self.max_actions_per_street
        }
    }

    /// Slot count of the fixed-width bet-history vector covering all four streets.
    pub fn history_width(&self) -> usize {
        2 + 4 * self.max_actions_per_street
    }

    /// Short display label per slot, e.g. `Raise 1P`.
    pub fn labels(&self) -> [String; NUM_ACTIONS] {
        let raise = |f: f64| format!("Raise {}P", f);
        [
            "Fold".to_string(),
            "Call".to_string(),
            "Check".to_string(),
            raise(self.pot_fractions[0]),
            raise(self.pot_fractions[1]),
            raise(self.pot_fractions[2]),
        ]
    }

    /// Project the node onto the menu.
    ///
    /// Raise targets are `max(pips) + trunc(pot_after_call * fraction)` clamped
    /// into the node's raise bounds, so distinct fractions may share an amount.
    /// Raises are masked once the live street is one entry short of its cap.
    pub fn make_actions(&self, state: &RoundState) -> (ActionVec, ActionMask) {
        let legal = state.legal_actions();
        let pot = state.pot();
        let pot_after_call = pot + state.pips[0].abs_diff(state.pips[1]);
        let facing = state.pips[0].max(state.pips[1]);
        let (min_raise, max_raise) = state.raise_bounds();

        let raise_to = |fraction: f64| -> Action {
            let size = (pot_after_call as f64 * fraction) as u32;
            Action::Raise(facing.saturating_add(size).clamp(min_raise, max_raise))
        };

        let actions: ActionVec = [
            Action::Fold,
            Action::Call,
            Action::Check,
            raise_to(self.pot_fractions[0]),
            raise_to(self.pot_fractions[1]),
            raise_to(self.pot_fractions[2]),
        ];

        let under_cap = state.street_entries() + 1 < self.street_cap(state.street);
        let can_raise = legal.raise && under_cap;
        let mask = ActionMask([
            legal.fold,
            legal.call,
            legal.check,
            can_raise,
            can_raise,
            can_raise,
        ]);

        (actions, mask)
    }
}
