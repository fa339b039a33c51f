//! Heads-up betting state machine.
//!
//! Encodes one hand of two-player hold'em: blinds, pip/stack accounting,
//! legal-action derivation, raise bounds, street advancement and showdown.
//! Every transition returns a fresh, independently owned node; nothing is
//! mutated in place, so sibling branches of a game-tree walk never alias.
//!
//! Streets are identified by the number of revealed board cards:
//! 0 (preflop), 3 (flop), 4 (turn), 5 (river).

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cards::{Card, Deck};
use crate::error::{CfrError, CfrResult};
use crate::hand_evaluator::compare_hands;

pub const NUM_PLAYERS: usize = 2;
pub const PREFLOP: u8 = 0;
pub const FLOP: u8 = 3;
pub const TURN: u8 = 4;
pub const RIVER: u8 = 5;

// ---------------------------------------------------------------------------
// Table configuration
// ---------------------------------------------------------------------------

/// Blind and stack sizes, in chips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub small_blind: u32,
    pub big_blind: u32,
    pub starting_stack: u32,
}

impl Default for TableConfig {
    fn default() -> Self {
        TableConfig {
            small_blind: 1,
            big_blind: 2,
            starting_stack: 200,
        }
    }
}

impl TableConfig {
    pub fn validate(&self) -> CfrResult<()> {
        if self.small_blind == 0 || self.big_blind < self.small_blind {
            return Err(CfrError::InvalidConfig(format!(
                "blinds must satisfy 0 < small_blind <= big_blind (got {}/{})",
                self.small_blind, self.big_blind
            )));
        }
        if self.starting_stack < self.big_blind {
            return Err(CfrError::InvalidConfig(format!(
                "starting_stack {} is smaller than the big blind {}",
                self.starting_stack, self.big_blind
            )));
        }
        Ok(())
    }

    /// Total chips in play for one hand.
    pub fn total_chips(&self) -> u32 {
        NUM_PLAYERS as u32 * self.starting_stack
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// A betting action. `Raise` carries the absolute target pip, not an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Fold,
    Call,
    Check,
    Raise(u32),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Fold => write!(f, "F"),
            Action::Call => write!(f, "C"),
            Action::Check => write!(f, "K"),
            Action::Raise(amount) => write!(f, "R{}", amount),
        }
    }
}

/// Which action types are legal at a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LegalActions {
    pub fold: bool,
    pub call: bool,
    pub check: bool,
    pub raise: bool,
}

impl LegalActions {
    pub fn permits(&self, action: &Action) -> bool {
        match action {
            Action::Fold => self.fold,
            Action::Call => self.call,
            Action::Check => self.check,
            Action::Raise(_) => self.raise,
        }
    }
}

// ---------------------------------------------------------------------------
// Deal
// ---------------------------------------------------------------------------

/// Cards for one hand. Shared read-only by every node of the hand.
#[derive(Debug)]
pub struct Deal {
    hands: [[Card; 2]; 2],
    deck: Vec<Card>,
    showdown: Ordering,
}

impl Deal {
    /// `deck` is the undealt remainder; its first five cards are the board.
    pub fn new(hands: [[Card; 2]; 2], deck: Vec<Card>) -> CfrResult<Deal> {
        if deck.len() < 5 {
            return Err(CfrError::NotEnoughDeck {
                requested: 5,
                available: deck.len(),
            });
        }
        let showdown = compare_hands(&hands[0], &hands[1], &deck[..5])?;
        Ok(Deal {
            hands,
            deck,
            showdown,
        })
    }

    /// Shuffle a fresh deck and deal two hole cards to each player.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> CfrResult<Deal> {
        let mut deck = Deck::full();
        deck.shuffle(rng);
        let h0 = deck.deal(2)?;
        let h1 = deck.deal(2)?;
        Deal::new([[h0[0], h0[1]], [h1[0], h1[1]]], deck.cards)
    }

    pub fn hands(&self) -> &[[Card; 2]; 2] {
        &self.hands
    }

    pub fn deck(&self) -> &[Card] {
        &self.deck
    }

    /// Board cards visible on `street`.
    pub fn board(&self, street: u8) -> &[Card] {
        &self.deck[..street as usize]
    }

    /// Player 0's showdown result against player 1 on the full board.
    pub fn showdown_order(&self) -> Ordering {
        self.showdown
    }
}

// ---------------------------------------------------------------------------
// Game nodes
// ---------------------------------------------------------------------------

/// End of a hand. `deltas[0] == -deltas[1]`.
#[derive(Debug, Clone)]
pub struct TerminalState {
    pub deltas: [i32; 2],
    /// The node this hand terminated from.
    pub previous_state: RoundState,
}

/// A decision point inside one hand.
#[derive(Debug, Clone)]
pub struct RoundState {
    /// `button % 2` is the acting player.
    pub button: u32,
    pub street: u8,
    pub pips: [u32; 2],
    pub stacks: [u32; 2],
    pub deal: Arc<Deal>,
    /// Raw contribution per action, one list per street. Preflop starts
    /// with the two blind posts.
    pub bet_history: Vec<Vec<u32>>,
    pub sb_player: usize,
    pub table: TableConfig,
}

#[derive(Debug, Clone)]
pub enum GameNode {
    Round(RoundState),
    Terminal(TerminalState),
}

impl GameNode {
    pub fn as_terminal(&self) -> Option<&TerminalState> {
        match self {
            GameNode::Round(_) => None,
            GameNode::Terminal(t) => Some(t),
        }
    }
}

impl RoundState {
    /// Post blinds and return the first preflop node. The small blind acts first.
    pub fn new_hand(sb_player: usize, deal: Arc<Deal>, table: TableConfig) -> RoundState {
        assert!(sb_player < NUM_PLAYERS, "sb_player out of range: {}", sb_player);
        let bb_player = 1 - sb_player;
        let mut pips = [0u32; 2];
        pips[sb_player] = table.small_blind;
        pips[bb_player] = table.big_blind;
        let stacks = [
            table.starting_stack - pips[0],
            table.starting_stack - pips[1],
        ];
        RoundState {
            button: sb_player as u32,
            street: PREFLOP,
            pips,
            stacks,
            deal,
            bet_history: vec![vec![table.small_blind, table.big_blind]],
            sb_player,
            table,
        }
    }

    pub fn active_player(&self) -> usize {
        (self.button % 2) as usize
    }

    pub fn hands(&self) -> &[[Card; 2]; 2] {
        self.deal.hands()
    }

    pub fn deck(&self) -> &[Card] {
        self.deal.deck()
    }

    pub fn board(&self) -> &[Card] {
        self.deal.board(self.street)
    }

    /// Chips committed by both players so far, including live pips.
    pub fn pot(&self) -> u32 {
        self.table.total_chips() - self.stacks[0] - self.stacks[1]
    }

    /// Chips the active player must add to match the opponent's pip.
    pub fn continue_cost(&self) -> u32 {
        let active = self.active_player();
        self.pips[1 - active] - self.pips[active]
    }

    /// Entries recorded on the live street, blind posts included.
    pub fn street_entries(&self) -> usize {
        self.bet_history.last().map_or(0, Vec::len)
    }

    /// Voluntary actions taken on the live street.
    fn street_actions_taken(&self) -> usize {
        let posts = if self.street == PREFLOP { 2 } else { 0 };
        self.street_entries().saturating_sub(posts)
    }

    pub fn legal_actions(&self) -> LegalActions {
        let active = self.active_player();
        let continue_cost = self.continue_cost();
        if continue_cost == 0 {
            // Betting needs chips behind on both sides.
            let bets_forbidden = self.stacks[0] == 0 || self.stacks[1] == 0;
            return LegalActions {
                check: true,
                raise: !bets_forbidden,
                ..LegalActions::default()
            };
        }
        let raises_forbidden = continue_cost == self.stacks[active] || self.stacks[1 - active] == 0;
        LegalActions {
            fold: true,
            call: true,
            raise: !raises_forbidden,
            ..LegalActions::default()
        }
    }

    /// Inclusive (min, max) absolute raise targets for the active player.
    pub fn raise_bounds(&self) -> (u32, u32) {
        let active = self.active_player();
        let continue_cost = self.continue_cost();
        let max_contribution = self.stacks[active].min(self.stacks[1 - active] + continue_cost);
        let min_contribution =
            max_contribution.min(continue_cost + continue_cost.max(self.table.big_blind));
        (
            self.pips[active] + min_contribution,
            self.pips[active] + max_contribution,
        )
    }

    fn record(&mut self, contribution: u32) {
        match self.bet_history.last_mut() {
            Some(street) => street.push(contribution),
            None => self.bet_history.push(vec![contribution]),
        }
    }

    /// Advance the hand by one action of the active player.
    ///
    /// Panics if the action is not legal here; illegal actions indicate a
    /// defect in action generation, not a runtime condition.
    pub fn proceed(&self, action: Action) -> GameNode {
        let legal = self.legal_actions();
        assert!(
            legal.permits(&action),
            "illegal action {} at button={} street={} pips={:?} stacks={:?}",
            action,
            self.button,
            self.street,
            self.pips,
            self.stacks
        );

        let active = self.active_player();
        let start = self.table.starting_stack as i32;
        match action {
            Action::Fold => {
                let delta = if active == 0 {
                    self.stacks[0] as i32 - start
                } else {
                    start - self.stacks[1] as i32
                };
                GameNode::Terminal(TerminalState {
                    deltas: [delta, -delta],
                    previous_state: self.clone(),
                })
            }
            Action::Call => {
                let mut next = self.clone();
                let contribution = self.continue_cost();
                next.stacks[active] -= contribution;
                next.pips[active] += contribution;
                next.button += 1;
                next.record(contribution);
                if self.street == PREFLOP && self.street_actions_taken() == 0 {
                    // Small blind completes; the big blind keeps its option.
                    return GameNode::Round(next);
                }
                next.proceed_street()
            }
            Action::Check => {
                let mut next = self.clone();
                next.record(0);
                if self.street_actions_taken() == 0 {
                    next.button += 1;
                    return GameNode::Round(next);
                }
                next.proceed_street()
            }
            Action::Raise(amount) => {
                let (min_raise, max_raise) = self.raise_bounds();
                assert!(
                    (min_raise..=max_raise).contains(&amount),
                    "raise to {} outside bounds [{}, {}]",
                    amount,
                    min_raise,
                    max_raise
                );
                let mut next = self.clone();
                let contribution = amount - self.pips[active];
                next.stacks[active] -= contribution;
                next.pips[active] += contribution;
                next.button += 1;
                next.record(contribution);
                GameNode::Round(next)
            }
        }
    }

    /// Reset pips and open the next street, or settle at showdown after the river.
    /// The big blind acts first on every postflop street.
    pub fn proceed_street(mut self) -> GameNode {
        if self.street == RIVER {
            return GameNode::Terminal(self.showdown());
        }
        self.bet_history.push(Vec::new());
        self.street = if self.street == PREFLOP {
            FLOP
        } else {
            self.street + 1
        };
        self.button = (1 - self.sb_player) as u32;
        self.pips = [0, 0];
        GameNode::Round(self)
    }

    /// Settle the hand on the full board. Split pots use floor division.
    pub fn showdown(&self) -> TerminalState {
        let start = self.table.starting_stack as i32;
        let delta = match self.deal.showdown_order() {
            Ordering::Greater => start - self.stacks[1] as i32,
            Ordering::Less => self.stacks[0] as i32 - start,
            Ordering::Equal => (self.stacks[0] as i32 - self.stacks[1] as i32).div_euclid(2),
        };
        TerminalState {
            deltas: [delta, -delta],
            previous_state: self.clone(),
        }
    }
}

/// Shuffle and deal a fresh hand, returning its first preflop node.
pub fn deal_new_round<R: Rng + ?Sized>(
    sb_player: usize,
    table: TableConfig,
    rng: &mut R,
) -> CfrResult<RoundState> {
    let deal = Deal::random(rng)?;
    Ok(RoundState::new_hand(sb_player, Arc::new(deal), table))
}

/// Street index 0..=3 (preflop, flop, turn, river) from the revealed card count.
pub fn street_index(street: u8) -> usize {
    if street == PREFLOP {
        0
    } else {
        street as usize - 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::parse_board;

    fn fixed_deal() -> Arc<Deal> {
        let cards = parse_board("AsAhKsKd2c7d9hTsJc").unwrap();
        let deck = cards[4..].to_vec();
        Arc::new(Deal::new([[cards[0], cards[1]], [cards[2], cards[3]]], deck).unwrap())
    }

    #[test]
    fn blinds_are_posted_by_seat() {
        let table = TableConfig::default();
        let s0 = RoundState::new_hand(0, fixed_deal(), table);
        assert_eq!(s0.pips, [1, 2]);
        assert_eq!(s0.stacks, [199, 198]);
        assert_eq!(s0.active_player(), 0);

        let s1 = RoundState::new_hand(1, fixed_deal(), table);
        assert_eq!(s1.pips, [2, 1]);
        assert_eq!(s1.stacks, [198, 199]);
        assert_eq!(s1.active_player(), 1);
        assert_eq!(s1.bet_history, vec![vec![1, 2]]);
    }

    #[test]
    fn street_index_maps_card_counts() {
        assert_eq!(street_index(PREFLOP), 0);
        assert_eq!(street_index(FLOP), 1);
        assert_eq!(street_index(TURN), 2);
        assert_eq!(street_index(RIVER), 3);
    }

    #[test]
    fn fold_loses_committed_chips() {
        let state = RoundState::new_hand(0, fixed_deal(), TableConfig::default());
        let node = state.proceed(Action::Fold);
        let terminal = node.as_terminal().unwrap();
        assert_eq!(terminal.deltas, [-1, 1]);
    }
}
