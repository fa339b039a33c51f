use std::path::Path;

use approx::assert_relative_eq;
use tempfile::tempdir;

use poker_cfr::cards::Card;
use poker_cfr::engine::TableConfig;
use poker_cfr::equity::EquityProvider;
use poker_cfr::error::CfrResult;
use poker_cfr::trainer::*;

/// Stronger-looking hole cards get more equity; no simulation.
struct HighCard;

impl EquityProvider for HighCard {
    fn equity(&self, hole: &[Card; 2], _board: &[Card], _iterations: usize) -> CfrResult<f64> {
        let top = hole[0].value().max(hole[1].value()) as f64;
        Ok((top - 2.0) / 12.0)
    }
}

fn tiny_config(dir: &Path) -> TrainerConfig {
    TrainerConfig {
        iterations: 2,
        traversals_per_iter: 4,
        workers: 2,
        eval_traversals: 2,
        seed: 17,
        output_dir: dir.to_path_buf(),
        table: TableConfig {
            small_blind: 1,
            big_blind: 2,
            starting_stack: 10,
        },
        equity_iterations: [20; 4],
        ..TrainerConfig::default()
    }
}

#[test]
fn test_train_writes_tables_and_reports() {
    let dir = tempdir().unwrap();
    let trainer = Trainer::new(tiny_config(dir.path())).unwrap();
    let reports = trainer.train().unwrap();

    // One evaluation after each traverse player's barrier.
    assert_eq!(reports.len(), 4);
    for (i, report) in reports.iter().enumerate() {
        assert_eq!(report.step, i);
        assert!(report.mean_mbb >= -1e-6);
        assert!(report.stdev_mbb >= 0.0);
        assert!(report.regret_sizes[0] > 0);
        assert!(report.avg_strategy_size > 0);
    }
    assert_eq!(reports[0].regret_sizes[1], 0);
    assert!(reports[1].regret_sizes[1] > 0);

    let paths = trainer.paths();
    assert!(paths.regrets[0].exists());
    assert!(paths.regrets[1].exists());
    assert!(paths.avg_strategy.exists());

    let text = std::fs::read_to_string(&paths.reports).unwrap();
    let saved: Vec<EvalReport> = serde_json::from_str(&text).unwrap();
    assert_eq!(saved, reports);
}

#[test]
fn test_fresh_tables_evaluate_uniform_play() {
    let dir = tempdir().unwrap();
    let trainer = Trainer::new(tiny_config(dir.path()))
        .unwrap()
        .with_equity_provider(Box::new(HighCard));
    let snapshot = trainer.load().unwrap();
    assert!(snapshot.regrets[0].is_empty());
    assert!(snapshot.avg_strategy.is_empty());

    let report = trainer.evaluate_with(0, 3).unwrap();
    assert!(report.mean_mbb > 0.0);
    assert_eq!(report.regret_sizes, [0, 0]);
}

#[test]
fn test_accumulate_regret_merges_worker_deltas() {
    let dir = tempdir().unwrap();
    let trainer = Trainer::new(tiny_config(dir.path()))
        .unwrap()
        .with_equity_provider(Box::new(HighCard));

    let nodes = trainer.accumulate_regret(0, 0).unwrap();
    assert!(nodes > 0);
    let snapshot = trainer.load().unwrap();
    assert!(!snapshot.regrets[0].is_empty());
    assert!(snapshot.regrets[1].is_empty());
    assert!(!snapshot.avg_strategy.is_empty());

    trainer.accumulate_regret(0, 1).unwrap();
    assert!(!trainer.load().unwrap().regrets[1].is_empty());
}

#[test]
fn test_workers_share_one_snapshot_per_iteration() {
    let dir = tempdir().unwrap();
    let trainer = Trainer::new(tiny_config(dir.path()))
        .unwrap()
        .with_equity_provider(Box::new(HighCard));
    trainer.accumulate_regret(0, 0).unwrap();
    trainer.accumulate_regret(0, 1).unwrap();

    // Replay every worker against the tables as they stood before the merge.
    let before = trainer.load().unwrap();
    let mut expected = before.clone();
    for (worker_id, &count) in trainer.worker_shares().iter().enumerate() {
        let (deltas, _) = trainer.collect_deltas(&before, 1, 0, worker_id, count).unwrap();
        expected.regrets[0].merge(&deltas.regrets[0]);
        expected.avg_strategy.merge(&deltas.avg_strategy);
    }

    trainer.accumulate_regret(1, 0).unwrap();
    let after = trainer.load().unwrap();
    for (table, want) in [
        (&after.regrets[0], &expected.regrets[0]),
        (&after.avg_strategy, &expected.avg_strategy),
    ] {
        assert_eq!(table.size(), want.size());
        for (key, values) in want.iter() {
            let got = table.get_regret(key).unwrap();
            for (g, w) in got.iter().zip(values.iter()) {
                assert_relative_eq!(*g, *w, epsilon = 1e-9, max_relative = 1e-9);
            }
        }
    }
    assert_eq!(after.regrets[1].size(), before.regrets[1].size());
}

#[test]
fn test_resume_keeps_tables() {
    let dir = tempdir().unwrap();
    let config = tiny_config(dir.path());
    {
        let trainer = Trainer::new(config.clone())
            .unwrap()
            .with_equity_provider(Box::new(HighCard));
        trainer.accumulate_regret(0, 0).unwrap();
    }
    let before = Trainer::new(config.clone()).unwrap().load().unwrap();
    assert!(!before.regrets[0].is_empty());

    let restarted = Trainer::new(TrainerConfig {
        resume: false,
        ..config
    })
    .unwrap();
    let after = restarted.load().unwrap();
    assert!(after.regrets[0].is_empty());
    assert!(after.avg_strategy.is_empty());
}

#[test]
fn test_single_worker_runs_are_reproducible() {
    let run = || {
        let dir = tempdir().unwrap();
        let config = TrainerConfig {
            workers: 1,
            ..tiny_config(dir.path())
        };
        let trainer = Trainer::new(config)
            .unwrap()
            .with_equity_provider(Box::new(HighCard));
        trainer.train().unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_config_from_json_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cfr.json");
    std::fs::write(
        &path,
        r#"{
            "iterations": 7,
            "workers": 3,
            "table": {"small_blind": 5, "big_blind": 10, "starting_stack": 1000},
            "menu": {"pot_fractions": [0.33, 0.75, 1.5], "max_actions_per_street": 6}
        }"#,
    )
    .unwrap();

    let config = TrainerConfig::from_json_file(&path).unwrap();
    assert_eq!(config.iterations, 7);
    assert_eq!(config.workers, 3);
    assert_eq!(config.table.big_blind, 10);
    assert_eq!(config.menu.max_actions_per_street, 6);
    assert_eq!(config.traversals_per_iter, TrainerConfig::default().traversals_per_iter);
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempdir().unwrap();
    let config = TrainerConfig {
        equity_iterations: [20, 0, 20, 20],
        ..tiny_config(dir.path())
    };
    assert!(Trainer::new(config).is_err());

    let config = TrainerConfig {
        uniform_threshold: -1.0,
        ..tiny_config(dir.path())
    };
    assert!(Trainer::new(config).is_err());
}
