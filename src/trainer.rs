//! Training loop.
//!
//! Per iteration and per traverse player the tables are loaded once, then a
//! fixed pool of workers runs their share of sampled traversals against that
//! snapshot into private deltas and merges them into the on-disk tables
//! under one lock. Joining the pool is the barrier: nothing reloads the
//! tables until every worker for that `(iteration, player)` has merged.
//! After each barrier the average strategy is reloaded and evaluated
//! full-width.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::actions::ActionMenu;
use crate::engine::{deal_new_round, GameNode, TableConfig};
use crate::equity::{EquityProvider, EquityTable, MonteCarloEquity};
use crate::error::{CfrError, CfrResult};
use crate::strategy::{RegretMatchedStrategy, DEFAULT_UNIFORM_THRESHOLD};
use crate::traverse::{exploitability_mbb, traverse, CfrDeltas, TraversalContext};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub iterations: usize,
    /// Sampled traversals per iteration and player, split across workers.
    pub traversals_per_iter: usize,
    pub workers: usize,
    /// Full-width evaluation deals per iteration.
    pub eval_traversals: usize,
    pub seed: u64,
    pub output_dir: PathBuf,
    pub table: TableConfig,
    pub menu: ActionMenu,
    /// Monte Carlo samples per street for the per-deal equity table.
    pub equity_iterations: [usize; 4],
    pub uniform_threshold: f64,
    /// Continue from existing tables in `output_dir` instead of starting over.
    pub resume: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            iterations: 100,
            traversals_per_iter: 1000,
            workers: 4,
            eval_traversals: 20,
            seed: 0,
            output_dir: PathBuf::from("memory/cfr"),
            table: TableConfig::default(),
            menu: ActionMenu::default(),
            equity_iterations: [1000; 4],
            uniform_threshold: DEFAULT_UNIFORM_THRESHOLD,
            resume: true,
        }
    }
}

impl TrainerConfig {
    pub fn from_json_file(path: &Path) -> CfrResult<Self> {
        let text = fs::read_to_string(path)?;
        let config: TrainerConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    pub fn validate(&self) -> CfrResult<()> {
        self.table.validate()?;
        self.menu.validate()?;
        if self.workers == 0 {
            return Err(CfrError::InvalidConfig("workers must be at least 1".to_string()));
        }
        if self.equity_iterations.contains(&0) {
            return Err(CfrError::InvalidConfig(
                "equity_iterations must be positive on every street".to_string(),
            ));
        }
        if self.uniform_threshold.is_nan() || self.uniform_threshold < 0.0 {
            return Err(CfrError::InvalidConfig(format!(
                "uniform_threshold must be non-negative (got {})",
                self.uniform_threshold
            )));
        }
        Ok(())
    }
}

/// File layout of one training run.
#[derive(Debug, Clone)]
pub struct TablePaths {
    pub regrets: [PathBuf; 2],
    pub avg_strategy: PathBuf,
    pub reports: PathBuf,
}

impl TablePaths {
    pub fn new(dir: &Path) -> Self {
        TablePaths {
            regrets: [dir.join("regrets_0.bin"), dir.join("regrets_1.bin")],
            avg_strategy: dir.join("avg_strategy.bin"),
            reports: dir.join("eval_reports.json"),
        }
    }

    fn tables(&self) -> [&Path; 3] {
        [&self.regrets[0], &self.regrets[1], &self.avg_strategy]
    }
}

/// Regret and average-strategy tables as read from disk.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub regrets: [RegretMatchedStrategy; 2],
    pub avg_strategy: RegretMatchedStrategy,
}

impl Snapshot {
    pub fn load(paths: &TablePaths, uniform_threshold: f64) -> CfrResult<Self> {
        let regrets = [
            RegretMatchedStrategy::load_or_default(&paths.regrets[0])?
                .with_threshold(uniform_threshold),
            RegretMatchedStrategy::load_or_default(&paths.regrets[1])?
                .with_threshold(uniform_threshold),
        ];
        let avg_strategy = RegretMatchedStrategy::load_or_default(&paths.avg_strategy)?
            .with_threshold(uniform_threshold);
        Ok(Snapshot {
            regrets,
            avg_strategy,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    pub step: usize,
    pub mean_mbb: f64,
    pub stdev_mbb: f64,
    pub regret_sizes: [usize; 2],
    pub avg_strategy_size: usize,
}

/// Mean and sample standard deviation. A single sample has zero spread.
pub fn mean_and_stdev(samples: &[f64]) -> (f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    if samples.len() < 2 {
        return (mean, 0.0);
    }
    let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

/// Derive an independent RNG stream from a tuple of counters.
fn stream_seed(parts: &[u64]) -> u64 {
    parts
        .iter()
        .fold(0xcbf2_9ce4_8422_2325u64, |h, &p| {
            (h ^ p).wrapping_mul(0x0000_0100_0000_01b3)
        })
}

// ---------------------------------------------------------------------------
// Trainer
// ---------------------------------------------------------------------------

pub struct Trainer {
    config: TrainerConfig,
    paths: TablePaths,
    pool: rayon::ThreadPool,
    lock: Mutex<()>,
    equity: Box<dyn EquityProvider>,
}

impl Trainer {
    /// Validate the config, build the worker pool and make sure all three
    /// tables exist on disk.
    pub fn new(config: TrainerConfig) -> CfrResult<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .build()?;
        let paths = TablePaths::new(&config.output_dir);
        let equity = Box::new(MonteCarloEquity::new(config.seed));
        let trainer = Trainer {
            config,
            paths,
            pool,
            lock: Mutex::new(()),
            equity,
        };
        trainer.init_tables()?;
        Ok(trainer)
    }

    /// Swap the equity source, e.g. for a precomputed lookup.
    pub fn with_equity_provider(mut self, equity: Box<dyn EquityProvider>) -> Self {
        self.equity = equity;
        self
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn paths(&self) -> &TablePaths {
        &self.paths
    }

    fn init_tables(&self) -> CfrResult<()> {
        fs::create_dir_all(&self.config.output_dir)?;
        let existing = self.paths.tables().iter().filter(|p| p.exists()).count();

        if self.config.resume && existing == 3 {
            info!(dir = %self.config.output_dir.display(), "resuming from existing tables");
            return Ok(());
        }
        if existing > 0 {
            warn!(
                dir = %self.config.output_dir.display(),
                existing,
                resume = self.config.resume,
                "starting over; existing tables will be replaced"
            );
        }
        let empty = RegretMatchedStrategy::new();
        for path in self.paths.tables() {
            empty.save(path)?;
        }
        info!(dir = %self.config.output_dir.display(), "initialized empty tables");
        Ok(())
    }

    /// Load the current tables from disk.
    pub fn load(&self) -> CfrResult<Snapshot> {
        Snapshot::load(&self.paths, self.config.uniform_threshold)
    }

    /// Run one iteration's sampled traversals for `traverse_player` on the
    /// worker pool and merge every worker's deltas. Returns nodes visited.
    ///
    /// The snapshot is read once up front, so every worker plays against the
    /// same tables no matter when the others merge.
    pub fn accumulate_regret(&self, t: usize, traverse_player: usize) -> CfrResult<usize> {
        let snapshot = self.load()?;
        let shares = self.worker_shares();

        let nodes = self.pool.install(|| {
            shares
                .par_iter()
                .enumerate()
                .map(|(worker_id, &count)| {
                    self.run_worker(&snapshot, t, traverse_player, worker_id, count)
                })
                .collect::<CfrResult<Vec<usize>>>()
        })?;

        let nodes: usize = nodes.iter().sum();
        debug!(t, traverse_player, nodes, "all workers merged");
        Ok(nodes)
    }

    /// Traversals assigned to each worker; the remainder goes to the first ones.
    pub fn worker_shares(&self) -> Vec<usize> {
        let workers = self.config.workers;
        let total = self.config.traversals_per_iter;
        (0..workers)
            .map(|w| total / workers + usize::from(w < total % workers))
            .collect()
    }

    /// One worker's sampled traversals against `snapshot`, without touching
    /// the files. Returns the deltas and the nodes visited.
    pub fn collect_deltas(
        &self,
        snapshot: &Snapshot,
        t: usize,
        traverse_player: usize,
        worker_id: usize,
        traversals: usize,
    ) -> CfrResult<(CfrDeltas, usize)> {
        let mut rng = StdRng::seed_from_u64(stream_seed(&[
            self.config.seed,
            t as u64,
            traverse_player as u64,
            worker_id as u64,
        ]));
        let mut deltas = CfrDeltas::new();
        let mut nodes = 0;

        for k in 0..traversals {
            let root = deal_new_round(k % 2, self.config.table, &mut rng)?;
            let equity =
                EquityTable::precompute(&root.deal, self.equity.as_ref(), &self.config.equity_iterations)?;
            let ctx = TraversalContext {
                traverse_player,
                iteration: t,
                equity: &equity,
                strategies: [&snapshot.regrets[0], &snapshot.regrets[1]],
                menu: &self.config.menu,
                allow_updates: true,
                external_sampling: true,
            };
            let info = traverse(&GameNode::Round(root), &ctx, [1.0, 1.0], &mut deltas, &mut rng);
            nodes += info.nodes;
        }
        Ok((deltas, nodes))
    }

    fn run_worker(
        &self,
        snapshot: &Snapshot,
        t: usize,
        traverse_player: usize,
        worker_id: usize,
        traversals: usize,
    ) -> CfrResult<usize> {
        if traversals == 0 {
            return Ok(0);
        }
        debug!(t, traverse_player, worker_id, traversals, "worker started");

        let (deltas, nodes) = self.collect_deltas(snapshot, t, traverse_player, worker_id, traversals)?;

        for (player, regrets) in deltas.regrets.iter().enumerate() {
            if !regrets.is_empty() {
                regrets.merge_and_save(&self.paths.regrets[player], &self.lock)?;
            }
        }
        if !deltas.avg_strategy.is_empty() {
            deltas
                .avg_strategy
                .merge_and_save(&self.paths.avg_strategy, &self.lock)?;
        }

        info!(t, traverse_player, worker_id, traversals, nodes, "worker finished");
        Ok(nodes)
    }

    /// Full-width exploitability of the saved average strategy, played by
    /// both seats, over `eval_traversals` deals seeded from `step`.
    pub fn evaluate(&self, step: usize) -> CfrResult<EvalReport> {
        self.evaluate_with(step, self.config.eval_traversals)
    }

    pub fn evaluate_with(&self, step: usize, traversals: usize) -> CfrResult<EvalReport> {
        let snapshot = self.load()?;
        let avg = &snapshot.avg_strategy;
        let cfg = &self.config;

        let samples = self.pool.install(|| {
            (0..traversals)
                .into_par_iter()
                .map(|k| -> CfrResult<f64> {
                    let mut rng =
                        StdRng::seed_from_u64(stream_seed(&[cfg.seed, u64::MAX, step as u64, k as u64]));
                    let root = deal_new_round(k % 2, cfg.table, &mut rng)?;
                    let equity =
                        EquityTable::precompute(&root.deal, self.equity.as_ref(), &cfg.equity_iterations)?;
                    let ctx = TraversalContext {
                        traverse_player: 0,
                        // Any non-zero iteration reads the table instead of uniform.
                        iteration: step + 1,
                        equity: &equity,
                        strategies: [avg, avg],
                        menu: &cfg.menu,
                        allow_updates: false,
                        external_sampling: false,
                    };
                    let mut unused = CfrDeltas::new();
                    let info = traverse(&GameNode::Round(root), &ctx, [1.0, 1.0], &mut unused, &mut rng);
                    Ok(exploitability_mbb(info.total_exploitability(), cfg.table.small_blind))
                })
                .collect::<CfrResult<Vec<f64>>>()
        })?;

        let (mean_mbb, stdev_mbb) = mean_and_stdev(&samples);
        Ok(EvalReport {
            step,
            mean_mbb,
            stdev_mbb,
            regret_sizes: [snapshot.regrets[0].size(), snapshot.regrets[1].size()],
            avg_strategy_size: snapshot.avg_strategy.size(),
        })
    }

    /// Run every configured iteration. Each traverse player's barrier is
    /// followed by an evaluation at step `2 * t + traverse_player`; reports
    /// are also written as JSON next to the tables.
    pub fn train(&self) -> CfrResult<Vec<EvalReport>> {
        let mut reports = Vec::with_capacity(2 * self.config.iterations);
        for t in 0..self.config.iterations {
            for traverse_player in 0..2 {
                let nodes = self.accumulate_regret(t, traverse_player)?;
                info!(t, traverse_player, nodes, "accumulated regret");

                let step = 2 * t + traverse_player;
                let report = self.evaluate(step)?;
                info!(
                    t,
                    traverse_player,
                    step,
                    mean_mbb = report.mean_mbb,
                    stdev_mbb = report.stdev_mbb,
                    regrets_0 = report.regret_sizes[0],
                    regrets_1 = report.regret_sizes[1],
                    avg_strategy = report.avg_strategy_size,
                    "evaluated average strategy"
                );
                reports.push(report);
                fs::write(&self.paths.reports, serde_json::to_string_pretty(&reports)?)?;
            }
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn stdev_is_sample_stdev() {
        let (mean, stdev) = mean_and_stdev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_relative_eq!(mean, 5.0);
        assert_relative_eq!(stdev, (32.0f64 / 7.0).sqrt());
        assert_eq!(mean_and_stdev(&[3.0]), (3.0, 0.0));
    }

    #[test]
    fn stream_seeds_differ_per_worker() {
        assert_ne!(stream_seed(&[0, 1, 0, 0]), stream_seed(&[0, 1, 0, 1]));
        assert_ne!(stream_seed(&[0, 1, 0, 0]), stream_seed(&[0, 1, 1, 0]));
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let config: TrainerConfig = serde_json::from_str(r#"{"iterations": 3}"#).unwrap();
        assert_eq!(config.iterations, 3);
        assert_eq!(config.workers, 4);
        assert_eq!(config.table, TableConfig::default());
        assert_eq!(config.equity_iterations, [1000; 4]);
    }

    #[test]
    fn zero_workers_rejected() {
        let config = TrainerConfig {
            workers: 0,
            ..TrainerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
