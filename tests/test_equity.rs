use std::sync::Arc;

use poker_cfr::cards::*;
use poker_cfr::engine::Deal;
use poker_cfr::equity::*;
use poker_cfr::error::CfrResult;

fn c(notation: &str) -> Card {
    parse_card(notation).unwrap()
}

#[test]
fn test_aa_vs_kk() {
    let result = equity_vs_hand(&[c("As"), c("Ah")], &[c("Ks"), c("Kh")], &[], 10000, 1).unwrap();
    assert!(result.equity() > 0.75);
    assert!(result.equity() < 0.88);
    assert_eq!(result.simulations, 10000);
}

#[test]
fn test_aa_vs_kk_on_flop() {
    let board = parse_board("2s5d8c").unwrap();
    let result = equity_vs_hand(&[c("As"), c("Ah")], &[c("Ks"), c("Kh")], &board, 10000, 1).unwrap();
    assert!(result.equity() > 0.85);
}

#[test]
fn test_made_hand_vs_draw() {
    let board = parse_board("Ts9s2h").unwrap();
    let result = equity_vs_hand(
        &[c("Td"), c("Th")], // set of tens
        &[c("As"), c("Ks")], // nut flush draw
        &board,
        10000,
        1,
    )
    .unwrap();
    assert!(result.equity() > 0.50);
}

#[test]
fn test_river_is_exact() {
    let board = parse_board("AsKdQh7c2d").unwrap();
    let result = equity_vs_hand(&[c("Ah"), c("Ad")], &[c("Kh"), c("Kc")], &board, 300, 9).unwrap();
    assert_eq!(result.win, 1.0);
}

#[test]
fn test_aces_vs_random() {
    let result = equity_vs_random(&[c("As"), c("Ah")], &[], 20000, 3).unwrap();
    assert!(result.equity() > 0.80);
    assert!(result.equity() < 0.90);
}

#[test]
fn test_seven_deuce_vs_random() {
    let result = equity_vs_random(&[c("7s"), c("2h")], &[], 20000, 3).unwrap();
    assert!(result.equity() < 0.40);
}

#[test]
fn test_same_seed_same_result() {
    let board = parse_board("Jh8c3d").unwrap();
    let a = equity_vs_random(&[c("Qs"), c("Js")], &board, 2000, 42).unwrap();
    let b = equity_vs_random(&[c("Qs"), c("Js")], &board, 2000, 42).unwrap();
    assert_eq!(a.win, b.win);
    assert_eq!(a.tie, b.tie);
}

#[test]
fn test_zero_simulations_rejected() {
    assert!(equity_vs_random(&[c("As"), c("Ah")], &[], 0, 0).is_err());
}

#[test]
fn test_result_string() {
    let result = equity_vs_hand(&[c("As"), c("Ah")], &[c("Ks"), c("Kh")], &[], 1000, 0).unwrap();
    let s = format!("{}", result);
    assert!(s.contains("Win"));
    assert!(s.contains("equity"));
}

struct BoardSize;

impl EquityProvider for BoardSize {
    fn equity(&self, _hole: &[Card; 2], board: &[Card], _iterations: usize) -> CfrResult<f64> {
        Ok(board.len() as f64 / 10.0)
    }
}

#[test]
fn test_table_reads_each_street_board() {
    let cards = parse_board("AsAhKsKd2c7d9hTsJc").unwrap();
    let deal = Arc::new(Deal::new([[cards[0], cards[1]], [cards[2], cards[3]]], cards[4..].to_vec()).unwrap());
    let table = EquityTable::precompute(&deal, &BoardSize, &[1; 4]).unwrap();
    assert_eq!(table.get(0, 0), 0.0);
    assert_eq!(table.get(0, 1), 0.3);
    assert_eq!(table.get(1, 2), 0.4);
    assert_eq!(table.get(1, 3), 0.5);
}

#[test]
fn test_monte_carlo_table_favours_stronger_hand() {
    let cards = parse_board("AsAh7c2d3h8sJdKc4c").unwrap();
    let deal = Deal::new([[cards[0], cards[1]], [cards[2], cards[3]]], cards[4..].to_vec()).unwrap();
    let table = EquityTable::precompute(&deal, &MonteCarloEquity::new(5), &[2000; 4]).unwrap();
    assert!(table.get(0, 0) > table.get(1, 0));
}
