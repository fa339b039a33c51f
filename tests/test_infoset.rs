use std::sync::Arc;

use poker_cfr::actions::ActionMenu;
use poker_cfr::cards::parse_board;
use poker_cfr::engine::*;
use poker_cfr::infoset::*;

const K: usize = 4;

fn deal() -> Arc<Deal> {
    let cards = parse_board("AsAhKsKd2c7d9hTsJc").unwrap();
    Arc::new(Deal::new([[cards[0], cards[1]], [cards[2], cards[3]]], cards[4..].to_vec()).unwrap())
}

fn round(node: GameNode) -> RoundState {
    match node {
        GameNode::Round(r) => r,
        GameNode::Terminal(_) => panic!("unexpected terminal"),
    }
}

fn key_for(state: &RoundState, equity: f64) -> String {
    make_infoset(state, state.active_player(), equity, K).bucket_key()
}

#[test]
fn test_equity_band_boundaries() {
    assert_eq!(equity_band(0.0), "H0");
    assert_eq!(equity_band(0.3999), "H0");
    assert_eq!(equity_band(0.4), "H1");
    assert_eq!(equity_band(0.5999), "H1");
    assert_eq!(equity_band(0.6), "H2");
    assert_eq!(equity_band(0.7999), "H2");
    assert_eq!(equity_band(0.8), "H3");
    assert_eq!(equity_band(1.0), "H3");
}

#[test]
fn test_history_layout() {
    let s = RoundState::new_hand(0, deal(), TableConfig::default());
    let info = make_infoset(&s, 0, 0.5, K);
    assert_eq!(info.history.len(), ActionMenu::default().history_width());
    assert_eq!(&info.history[..3], &[1, 2, 0]);
    assert_eq!(info.position, 0);
    assert_eq!(info.street, 0);
}

#[test]
fn test_position_follows_small_blind_seat() {
    let s = RoundState::new_hand(1, deal(), TableConfig::default());
    assert_eq!(make_infoset(&s, 1, 0.5, K).position, 0);
    assert_eq!(make_infoset(&s, 0, 0.5, K).position, 1);
}

#[test]
fn test_long_streets_alias_onto_last_two_slots() {
    let mut s = RoundState::new_hand(0, deal(), TableConfig::default());
    s.bet_history = vec![vec![1, 2, 4, 8, 16, 32, 64, 128], vec![3, 5, 7, 11, 13]];
    s.street = FLOP;
    let info = make_infoset(&s, 0, 0.5, K);
    assert_eq!(&info.history[..6], &[1, 2, 4, 8, 80, 160]);
    // Flop block starts at slot 6 and is four wide; the fifth entry wraps to slot 8.
    assert_eq!(&info.history[6..10], &[3, 5, 20, 11]);
    assert!(info.history[10..].iter().all(|&v| v == 0));
}

#[test]
fn test_opening_key() {
    let s = RoundState::new_hand(0, deal(), TableConfig::default());
    assert_eq!(key_for(&s, 0.5), "SB.P.H1|x.x.x.x|x.x.x.x|x.x.x.x");
}

#[test]
fn test_limp_key() {
    let s = RoundState::new_hand(0, deal(), TableConfig::default());
    let s = round(s.proceed(Action::Call));
    assert_eq!(key_for(&s, 0.85), "BB.P.H3|x.x.x.x|x.x.x.x|CL.x.x.x");
}

#[test]
fn test_raise_war_keys() {
    let s = RoundState::new_hand(0, deal(), TableConfig::default());
    let s = round(s.proceed(Action::Call));
    let s = round(s.proceed(Action::Raise(8)));
    let s = round(s.proceed(Action::Raise(14)));
    // 6 into a pot of 4 is 1.5 pot; 12 facing 6 is a half-pot raise.
    assert_eq!(key_for(&s, 0.62), "BB.P.H2|R.x.x.x|R.x.x.x|CL.1P.HP.x");

    let s = round(s.proceed(Action::Call));
    assert_eq!(s.active_player(), 1);
    assert_eq!(key_for(&s, 0.62), "BB.F.H2|R.x.x.x|R.x.x.x|x.x.x.x");

    let s = round(s.proceed(Action::Check));
    assert_eq!(key_for(&s, 0.62), "SB.F.H2|R.x.x.x|R.x.x.x|CK.x.x.x");

    let menu = ActionMenu::default();
    let (actions, mask) = menu.make_actions(&s);
    assert!(mask.is_legal(4));
    assert_eq!(actions[4], Action::Raise(28));
    let s = round(s.proceed(actions[4]));
    assert_eq!(key_for(&s, 0.62), "BB.F.H2|R.x.x.x|R.R.x.x|CK.1P.x.x");
}

#[test]
fn test_wrapped_raise_token() {
    let mut history = vec![0u32; 2 + 4 * K];
    history[..4].copy_from_slice(&[1, 2, 1, 0]);
    history[6..10].copy_from_slice(&[4, 12, 20, 6]);
    let info = InfoSet {
        position: 0,
        street: 1,
        equity: 0.3,
        history,
    };
    assert_eq!(info.bucket_key(), "SB.F.H0|x.R.x.x|x.R.x.x|1P.HP.HP.?P");
}

#[test]
fn test_keys_are_deterministic() {
    let s = RoundState::new_hand(1, deal(), TableConfig::default());
    let s = round(s.proceed(Action::Raise(6)));
    let a = make_infoset(&s, s.active_player(), 0.41, K);
    let b = make_infoset(&s, s.active_player(), 0.41, K);
    assert_eq!(a, b);
    assert_eq!(a.bucket_key(), b.bucket_key());
    assert_eq!(a.bucket_tokens().len(), NUM_TOKENS);
}
