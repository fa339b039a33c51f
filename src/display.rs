use colored::Colorize;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};

use crate::actions::NUM_ACTIONS;
use crate::cards::{Card, Suit};
use crate::strategy::ActionRegrets;
use crate::trainer::EvalReport;

pub fn equity_bar(equity: f64, width: usize) -> String {
    let filled = ((equity.clamp(0.0, 1.0)) * width as f64) as usize;
    let bar: String = "\u{2588}".repeat(filled) + &"\u{2591}".repeat(width - filled);
    let pct = format!("{:.1}%", equity * 100.0);

    if equity >= 0.6 {
        format!("{} {}", bar.green(), pct)
    } else if equity >= 0.4 {
        format!("{} {}", bar.yellow(), pct)
    } else {
        format!("{} {}", bar.red(), pct)
    }
}

pub fn board_display(cards: &[Card]) -> String {
    cards
        .iter()
        .map(|card| {
            let text = card.pretty();
            match card.suit {
                Suit::Spades => text.white().to_string(),
                Suit::Hearts => text.red().to_string(),
                Suit::Diamonds => text.blue().to_string(),
                Suit::Clubs => text.green().to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Color an action label by its kind: raises red, calls green, checks
/// yellow, folds dimmed.
pub fn styled_action(label: &str) -> String {
    let upper = label.to_uppercase();
    if upper.starts_with("RAISE") {
        label.red().bold().to_string()
    } else if upper == "CALL" {
        label.green().bold().to_string()
    } else if upper == "CHECK" {
        label.yellow().bold().to_string()
    } else if upper == "FOLD" {
        label.dimmed().bold().to_string()
    } else {
        label.bold().to_string()
    }
}

fn probability_cell(p: f64) -> Cell {
    let text = if p <= 0.0 {
        "-".dimmed().to_string()
    } else {
        let pct = format!("{:.1}%", p * 100.0);
        if p >= 0.5 {
            pct.green().bold().to_string()
        } else if p >= 0.2 {
            pct.yellow().to_string()
        } else {
            pct
        }
    };
    Cell::new(text).set_alignment(CellAlignment::Right)
}

/// One row per bucket with its normalized action frequencies.
pub fn strategy_table(rows: &[(String, ActionRegrets)], labels: &[String; NUM_ACTIONS]) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec![Cell::new("Bucket".bold().to_string())];
    for label in labels {
        header.push(Cell::new(styled_action(label)).set_alignment(CellAlignment::Right));
    }
    table.set_header(header);

    for (key, probs) in rows {
        let mut row = vec![Cell::new(key)];
        row.extend(probs.iter().map(|&p| probability_cell(p)));
        table.add_row(row);
    }

    table.to_string()
}

/// Exploitability per evaluation step. Improvements over the previous step
/// are green, regressions red.
pub fn eval_report_table(reports: &[EvalReport]) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Step").set_alignment(CellAlignment::Right),
        Cell::new("Exploitability (mbb/g)").set_alignment(CellAlignment::Right),
        Cell::new("Stdev").set_alignment(CellAlignment::Right),
        Cell::new("Regrets P0").set_alignment(CellAlignment::Right),
        Cell::new("Regrets P1").set_alignment(CellAlignment::Right),
        Cell::new("Avg Strategy").set_alignment(CellAlignment::Right),
    ]);

    let mut previous: Option<f64> = None;
    for report in reports {
        let mean = format!("{:.1}", report.mean_mbb);
        let mean = match previous {
            Some(prev) if report.mean_mbb < prev => mean.green().to_string(),
            Some(prev) if report.mean_mbb > prev => mean.red().to_string(),
            _ => mean,
        };
        previous = Some(report.mean_mbb);

        table.add_row(vec![
            Cell::new(report.step).set_alignment(CellAlignment::Right),
            Cell::new(mean).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.1}", report.stdev_mbb)).set_alignment(CellAlignment::Right),
            Cell::new(report.regret_sizes[0]).set_alignment(CellAlignment::Right),
            Cell::new(report.regret_sizes[1]).set_alignment(CellAlignment::Right),
            Cell::new(report.avg_strategy_size).set_alignment(CellAlignment::Right),
        ]);
    }

    table.to_string()
}

pub fn print_section(title: &str, content: &str) {
    println!("\n{}", title.cyan().bold());
    println!("  {}", content);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "Error:".red().bold(), msg);
}

pub fn print_success(msg: &str) {
    println!("{}", msg.green().bold());
}
