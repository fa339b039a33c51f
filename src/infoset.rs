//! Information-set abstraction.
//!
//! A node is reduced to what the acting player can see: their position, the
//! street, a precomputed equity estimate and a fixed-width bet history. The
//! bucket key collapses that further into the string used to index regret
//! tables.
//!
//! The history vector gives every street a fixed block of slots. Once a
//! street runs past its block, later actions are summed onto the last two
//! slots (keeping each player's parity), so long raise wars alias instead of
//! overflowing. Saved tables depend on this layout.

use crate::engine::{street_index, RoundState};

/// Equity band upper bounds: `H0 < 0.4 <= H1 < 0.6 <= H2 < 0.8 <= H3`.
pub const EQUITY_BANDS: [f64; 3] = [0.4, 0.6, 0.8];

pub const NUM_TOKENS: usize = 15;

const STREET_TOKENS: [&str; 4] = ["P", "F", "T", "R"];
const BAND_TOKENS: [&str; 4] = ["H0", "H1", "H2", "H3"];

const PLAYER_RAISED_OFFSET: usize = 3;
const OPP_RAISED_OFFSET: usize = 7;
const STREET_ACTIONS_OFFSET: usize = 11;
const MAX_STREET_TOKENS: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct InfoSet {
    /// 0 if the acting player posted the small blind, 1 otherwise.
    pub position: usize,
    /// Street index 0..=3.
    pub street: usize,
    pub equity: f64,
    /// Summed chip contributions per slot, `2 + 4 * K` wide. [`InfoSet::pack`]
    /// exposes them as pot fractions.
    pub history: Vec<u32>,
}

pub fn equity_band(equity: f64) -> &'static str {
    let band = EQUITY_BANDS
        .iter()
        .position(|&upper| equity < upper)
        .unwrap_or(EQUITY_BANDS.len());
    BAND_TOKENS[band]
}

/// First slot of `street` (0..=3) in the fixed history.
pub fn street_offset(street: usize, max_actions_per_street: usize) -> usize {
    street * max_actions_per_street + if street > 0 { 2 } else { 0 }
}

/// Slot within a street for the `action`-th entry on a street `width` slots wide.
pub fn wrapped_slot(action: usize, width: usize) -> usize {
    action.min(width - 2 + action % 2)
}

/// Build the acting player's view of `state`.
pub fn make_infoset(
    state: &RoundState,
    player: usize,
    equity: f64,
    max_actions_per_street: usize,
) -> InfoSet {
    let k = max_actions_per_street;
    let mut history = vec![0u32; 2 + 4 * k];

    for (street, actions) in state.bet_history.iter().take(4).enumerate() {
        let offset = street_offset(street, k);
        let width = if street == 0 { k + 2 } else { k };
        for (i, &amount) in actions.iter().enumerate() {
            history[offset + wrapped_slot(i, width)] += amount;
        }
    }

    InfoSet {
        position: if player == state.sb_player { 0 } else { 1 },
        street: street_index(state.street),
        equity,
        history,
    }
}

impl InfoSet {
    pub fn actions_per_street(&self) -> usize {
        (self.history.len() - 2) / 4
    }

    /// Feature vector for function approximators: position, equity, then
    /// each history slot as a fraction of the pot before it. The two blind
    /// slots are measured against the posted blinds.
    pub fn pack(&self) -> Vec<f32> {
        let h = &self.history;
        let blinds = h.iter().take(2).sum::<u32>();
        let mut out = Vec::with_capacity(2 + h.len());
        out.push(self.position as f32);
        out.push(self.equity as f32);

        let mut pot = blinds;
        for (i, &amount) in h.iter().enumerate() {
            let before = if i < 2 { blinds } else { pot };
            out.push(if before == 0 { 0.0 } else { amount as f32 / before as f32 });
            if i >= 2 {
                pot += amount;
            }
        }
        out
    }

    /// The fifteen bucket tokens, `"x"` where nothing applies.
    ///
    /// Layout: position, street, equity band; raised-on-street flags for the
    /// acting player (4) and opponent (4); up to four action tokens for the
    /// live street.
    pub fn bucket_tokens(&self) -> [&'static str; NUM_TOKENS] {
        let k = self.actions_per_street();
        let h = &self.history;
        let mut tokens = ["x"; NUM_TOKENS];

        tokens[0] = if self.position == 0 { "SB" } else { "BB" };
        tokens[1] = STREET_TOKENS[self.street.min(3)];
        tokens[2] = equity_band(self.equity);

        let cumulative: Vec<i64> = h
            .iter()
            .scan(0i64, |acc, &v| {
                *acc += v as i64;
                Some(*acc)
            })
            .collect();

        // Pips are tracked by slot parity, which is stable across wrapping.
        let mut pips = [0i64; 2];
        for i in 0..h.len() {
            if i > 2 && (i - 2) % k == 0 {
                pips = [0, 0];
            }
            let street = if i > 2 { (i - 2) / k } else { 0 };
            if street > self.street {
                break;
            }

            let seat = i % 2;
            // SB owns even slots preflop; BB acts first (even slots) postflop.
            let is_player = if street == 0 {
                seat == self.position
            } else {
                seat != self.position
            };

            let amount = h[i] as i64;
            let after = pips[seat] + amount;
            let facing = pips[1 - seat];

            if after < facing && amount == 0 {
                break;
            }
            let wrapped_raise = after < facing && amount > 0;
            let check = after == facing && amount == 0;
            let call = after == facing && amount > 0;
            let raise = after > facing;

            if raise && i >= 2 {
                let base = if is_player {
                    PLAYER_RAISED_OFFSET
                } else {
                    OPP_RAISED_OFFSET
                };
                tokens[base + street] = "R";
            }

            if street == self.street && i >= 2 {
                let call_amount = (pips[0] - pips[1]).abs();
                let offset = if street == 0 { i - 2 } else { (i - 2) % k };
                let token = if check {
                    let bet_follows = i + 1 < h.len() && h[i + 1] > 0;
                    if offset == 0 && (!is_player || bet_follows) {
                        "CK"
                    } else {
                        break;
                    }
                } else if call {
                    "CL"
                } else if wrapped_raise {
                    "?P"
                } else {
                    let fraction = (amount - call_amount) as f64
                        / (cumulative[i - 1] + call_amount) as f64;
                    if fraction <= 0.75 {
                        "HP"
                    } else if fraction <= 1.5 {
                        "1P"
                    } else {
                        "2P"
                    }
                };
                if offset < MAX_STREET_TOKENS {
                    tokens[STREET_ACTIONS_OFFSET + offset] = token;
                }
            }

            pips[seat] += amount;
        }

        tokens
    }

    /// Regret-table key, e.g. `SB.F.H2|x.x.x.x|R.x.x.x|CK.HP.x.x`.
    pub fn bucket_key(&self) -> String {
        let t = self.bucket_tokens();
        format!(
            "{}|{}|{}|{}",
            t[0..3].join("."),
            t[3..7].join("."),
            t[7..11].join("."),
            t[11..15].join(".")
        )
    }
}
