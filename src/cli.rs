use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use crate::actions::{ActionMask, ActionMenu, NUM_ACTIONS};
use crate::cards::{format_cards, parse_board, parse_hole_cards};
use crate::display::{
    board_display, equity_bar, eval_report_table, print_error, print_section, print_success,
    strategy_table,
};
use crate::equity::{equity_vs_hand, equity_vs_random};
use crate::error::{CfrError, CfrResult};
use crate::strategy::{regret_match, ActionRegrets, RegretMatchedStrategy, DEFAULT_UNIFORM_THRESHOLD};
use crate::trainer::{TablePaths, Trainer, TrainerConfig};

#[derive(Parser)]
#[command(name = "cfr", version = "0.1.0", about = "Heads-up poker CFR trainer: external-sampling regret minimization and exploitability evaluation.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the training loop
    Train {
        /// JSON trainer config; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// CFR iterations
        #[arg(long)]
        iterations: Option<usize>,
        /// Sampled traversals per iteration and player
        #[arg(long)]
        traversals: Option<usize>,
        /// Worker threads
        #[arg(short, long)]
        workers: Option<usize>,
        /// Evaluation deals per iteration
        #[arg(long)]
        eval: Option<usize>,
        /// Base RNG seed
        #[arg(long)]
        seed: Option<u64>,
        /// Output directory for tables and reports
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Discard existing tables instead of resuming
        #[arg(long)]
        fresh: bool,
    },
    /// Measure exploitability of a saved average strategy
    Evaluate {
        /// Directory holding regrets_0.bin, regrets_1.bin and avg_strategy.bin
        #[arg(short, long)]
        dir: PathBuf,
        /// Evaluation deals
        #[arg(short = 'n', long, default_value = "20")]
        traversals: usize,
        /// JSON trainer config (table, menu and equity settings)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Seed for the evaluation deals
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print buckets of a saved table with their strategies
    Inspect {
        /// Table file (regrets_*.bin or avg_strategy.bin)
        #[arg(short, long)]
        file: PathBuf,
        /// Maximum rows
        #[arg(short, long, default_value = "20")]
        top: usize,
        /// Only show buckets starting with this prefix (e.g. "SB.F")
        #[arg(long)]
        filter: Option<String>,
        /// Treat the file as a regret table and show its regret-matched strategy
        #[arg(long)]
        regrets: bool,
    },
    /// Monte Carlo equity of a hand against a random holding or a given hand
    Equity {
        /// Hole cards (e.g., AhKs)
        hand: String,
        /// Board cards (e.g., AsKd5c)
        #[arg(short, long)]
        board: Option<String>,
        /// Opponent hole cards; omit for a random holding
        #[arg(long)]
        vs: Option<String>,
        /// Number of simulations
        #[arg(short = 'n', long, default_value = "30000")]
        sims: usize,
        /// RNG seed
        #[arg(long, default_value = "0")]
        seed: u64,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A subscriber may already be installed by an embedding process.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

pub fn run() {
    let cli = Cli::parse();
    dispatch(cli);
}

fn dispatch(cli: Cli) {
    init_tracing();
    let result = match cli.command {
        Commands::Train {
            config,
            iterations,
            traversals,
            workers,
            eval,
            seed,
            out,
            fresh,
        } => load_config(config.as_deref()).and_then(|mut cfg| {
            if let Some(v) = iterations {
                cfg.iterations = v;
            }
            if let Some(v) = traversals {
                cfg.traversals_per_iter = v;
            }
            if let Some(v) = workers {
                cfg.workers = v;
            }
            if let Some(v) = eval {
                cfg.eval_traversals = v;
            }
            if let Some(v) = seed {
                cfg.seed = v;
            }
            if let Some(v) = out {
                cfg.output_dir = v;
            }
            if fresh {
                cfg.resume = false;
            }
            cmd_train(cfg)
        }),
        Commands::Evaluate {
            dir,
            traversals,
            config,
            seed,
        } => cmd_evaluate(dir, traversals, config, seed),
        Commands::Inspect {
            file,
            top,
            filter,
            regrets,
        } => cmd_inspect(&file, top, filter.as_deref(), regrets),
        Commands::Equity {
            hand,
            board,
            vs,
            sims,
            seed,
        } => cmd_equity(&hand, board.as_deref(), vs.as_deref(), sims, seed),
    };

    if let Err(e) = result {
        print_error(&e.to_string());
        process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> CfrResult<TrainerConfig> {
    match path {
        Some(p) => TrainerConfig::from_json_file(p),
        None => Ok(TrainerConfig::default()),
    }
}

fn cmd_train(config: TrainerConfig) -> CfrResult<()> {
    print_section(
        "Training",
        &format!(
            "{} iterations x {} traversals on {} workers -> {}",
            config.iterations,
            config.traversals_per_iter,
            config.workers,
            config.output_dir.display()
        ),
    );
    let trainer = Trainer::new(config)?;
    let reports = trainer.train()?;

    println!("\n{}", eval_report_table(&reports));
    print_success(&format!(
        "Saved tables and reports to {}",
        trainer.config().output_dir.display()
    ));
    Ok(())
}

fn cmd_evaluate(
    dir: PathBuf,
    traversals: usize,
    config: Option<PathBuf>,
    seed: Option<u64>,
) -> CfrResult<()> {
    // Trainer::new replaces an incomplete set of tables, so refuse early.
    let paths = TablePaths::new(&dir);
    for path in [&paths.regrets[0], &paths.regrets[1], &paths.avg_strategy] {
        if !path.exists() {
            return Err(CfrError::TableNotFound(path.display().to_string()));
        }
    }
    let mut cfg = load_config(config.as_deref())?;
    cfg.output_dir = dir;
    cfg.resume = true;
    if let Some(s) = seed {
        cfg.seed = s;
    }

    let trainer = Trainer::new(cfg)?;
    let report = trainer.evaluate_with(0, traversals)?;
    println!("\n{}", eval_report_table(std::slice::from_ref(&report)));
    Ok(())
}

fn cmd_inspect(file: &Path, top: usize, filter: Option<&str>, as_regrets: bool) -> CfrResult<()> {
    let table = RegretMatchedStrategy::load(file)?;
    let all_legal = ActionMask([true; NUM_ACTIONS]);

    let rows: Vec<(String, ActionRegrets)> = table
        .iter()
        .filter(|(key, _)| filter.map_or(true, |prefix| key.starts_with(prefix)))
        .filter_map(|(key, values)| {
            let probs = if as_regrets {
                Some(regret_match(values, &all_legal, DEFAULT_UNIFORM_THRESHOLD))
            } else {
                table.average_policy(key)
            };
            probs.map(|p| (key.clone(), p))
        })
        .take(top)
        .collect();

    print_section(
        "Table",
        &format!("{} ({} buckets)", file.display(), table.size()),
    );
    if rows.is_empty() {
        println!("  {}", "No matching buckets.".dimmed());
        return Ok(());
    }
    let labels = ActionMenu::default().labels();
    println!("{}", strategy_table(&rows, &labels));
    Ok(())
}

fn cmd_equity(
    hand: &str,
    board: Option<&str>,
    vs: Option<&str>,
    sims: usize,
    seed: u64,
) -> CfrResult<()> {
    let hero = parse_hole_cards(hand)?;
    let board_cards = match board {
        Some(b) => parse_board(b)?,
        None => Vec::new(),
    };

    let result = match vs {
        Some(v) => {
            let villain = parse_hole_cards(v)?;
            equity_vs_hand(&hero, &villain, &board_cards, sims, seed)?
        }
        None => equity_vs_random(&hero, &board_cards, sims, seed)?,
    };

    let opponent = vs.map_or_else(|| "random hand".to_string(), |v| v.to_string());
    print_section(
        "Equity",
        &format!("{} vs {}", format_cards(&hero), opponent),
    );
    if !board_cards.is_empty() {
        println!("  Board: {}", board_display(&board_cards));
    }
    println!("  {}", equity_bar(result.equity(), 30));
    println!("  {}", result);
    Ok(())
}
