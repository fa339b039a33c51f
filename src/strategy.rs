//! Regret-matched strategy store.
//!
//! Maps bucket keys to cumulative vectors over the six-slot action menu.
//! The same type backs both the per-player regret tables and the average
//! strategy table. Entries are created as zeros on first touch and never
//! removed.
//!
//! Workers never share a live table. Each one reads a loaded snapshot,
//! accumulates into a private table of deltas and folds it into the file
//! on disk with [`RegretMatchedStrategy::merge_and_save`].

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use itertools::Itertools;
use parking_lot::Mutex;
use tracing::debug;

use crate::actions::{ActionMask, NUM_ACTIONS};
use crate::error::{CfrError, CfrResult};
use crate::infoset::InfoSet;

pub type ActionRegrets = [f64; NUM_ACTIONS];

/// Positive-regret mass below which regret matching falls back to uniform.
pub const DEFAULT_UNIFORM_THRESHOLD: f64 = 1e-3;

// ---------------------------------------------------------------------------
// Strategy provider contract
// ---------------------------------------------------------------------------

/// Anything that can produce a distribution over the action menu for an infoset.
///
/// Probabilities of masked-out slots are exactly zero and the rest sum to one.
pub trait StrategyProvider: Sync {
    fn get_strategy(&self, infoset: &InfoSet, mask: &ActionMask) -> ActionRegrets;

    fn get_strategy_uniform(&self, mask: &ActionMask) -> ActionRegrets {
        uniform_strategy(mask)
    }
}

/// Uniform distribution over the legal slots.
pub fn uniform_strategy(mask: &ActionMask) -> ActionRegrets {
    let n = mask.count();
    assert!(n > 0, "action mask has no legal actions");
    let p = 1.0 / n as f64;
    let mut out = [0.0; NUM_ACTIONS];
    for slot in mask.legal_slots() {
        out[slot] = p;
    }
    out
}

/// Project cumulative regret onto the simplex of legal actions.
///
/// Positive regret is normalized; when its total is zero or below
/// `threshold` the result is uniform over the mask.
pub fn regret_match(regrets: &ActionRegrets, mask: &ActionMask, threshold: f64) -> ActionRegrets {
    let mut out = [0.0; NUM_ACTIONS];
    let mut total = 0.0;
    for slot in mask.legal_slots() {
        let r = regrets[slot].max(0.0);
        out[slot] = r;
        total += r;
    }
    if total <= 0.0 || total < threshold {
        return uniform_strategy(mask);
    }
    for p in out.iter_mut() {
        *p /= total;
    }
    out
}

// ---------------------------------------------------------------------------
// Tabular store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RegretMatchedStrategy {
    table: HashMap<String, ActionRegrets>,
    uniform_threshold: f64,
}

impl Default for RegretMatchedStrategy {
    fn default() -> Self {
        RegretMatchedStrategy {
            table: HashMap::new(),
            uniform_threshold: DEFAULT_UNIFORM_THRESHOLD,
        }
    }
}

impl RegretMatchedStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.uniform_threshold = threshold;
        self
    }

    pub fn size(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn add_regret(&mut self, infoset: &InfoSet, r: &ActionRegrets) {
        self.add_regret_key(&infoset.bucket_key(), r);
    }

    /// Elementwise accumulate into `key`, creating a zero vector first if needed.
    pub fn add_regret_key(&mut self, key: &str, r: &ActionRegrets) {
        let entry = self
            .table
            .entry(key.to_string())
            .or_insert([0.0; NUM_ACTIONS]);
        for (acc, v) in entry.iter_mut().zip(r.iter()) {
            *acc += v;
        }
    }

    pub fn get_regret(&self, key: &str) -> Option<&ActionRegrets> {
        self.table.get(key)
    }

    /// Regret-matched strategy for a raw key. Unknown keys are uniform.
    pub fn strategy_for_key(&self, key: &str, mask: &ActionMask) -> ActionRegrets {
        match self.table.get(key) {
            Some(regrets) => regret_match(regrets, mask, self.uniform_threshold),
            None => uniform_strategy(mask),
        }
    }

    /// Normalized cumulative vector, for reading an average-strategy table.
    /// Returns `None` for unknown keys or an empty vector.
    pub fn average_policy(&self, key: &str) -> Option<ActionRegrets> {
        let weights = self.table.get(key)?;
        let total: f64 = weights.iter().map(|w| w.max(0.0)).sum();
        if total <= 0.0 {
            return None;
        }
        let mut out = [0.0; NUM_ACTIONS];
        for (o, w) in out.iter_mut().zip(weights.iter()) {
            *o = w.max(0.0) / total;
        }
        Some(out)
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ActionRegrets)> {
        self.table.iter().sorted_by(|a, b| a.0.cmp(b.0))
    }

    /// Add every entry of `other` into this table.
    pub fn merge(&mut self, other: &RegretMatchedStrategy) {
        for (key, r) in &other.table {
            self.add_regret_key(key, r);
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Write the table to `path` via a sibling temp file and a rename.
    pub fn save(&self, path: &Path) -> CfrResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = temp_path(path);
        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            bincode::serialize_into(&mut writer, &self.table)?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), entries = self.table.len(), "saved table");
        Ok(())
    }

    /// Read a table. A missing file is an error.
    pub fn load(path: &Path) -> CfrResult<RegretMatchedStrategy> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CfrError::TableNotFound(path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let table: HashMap<String, ActionRegrets> =
            bincode::deserialize_from(BufReader::new(file))?;
        debug!(path = %path.display(), entries = table.len(), "loaded table");
        Ok(RegretMatchedStrategy {
            table,
            uniform_threshold: DEFAULT_UNIFORM_THRESHOLD,
        })
    }

    /// Read a table, treating a missing file as empty. Corrupt files still fail.
    pub fn load_or_default(path: &Path) -> CfrResult<RegretMatchedStrategy> {
        match Self::load(path) {
            Err(CfrError::TableNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    /// Fold this table into the one stored at `path`.
    ///
    /// Blocks until `lock` is free, then loads the stored table (or starts
    /// empty), adds this table into it and saves. Addition makes the result
    /// independent of the order workers arrive in. Returns the merged size.
    pub fn merge_and_save(&self, path: &Path, lock: &Mutex<()>) -> CfrResult<usize> {
        let _guard = lock.lock();
        let mut stored = Self::load_or_default(path)?;
        stored.merge(self);
        stored.save(path)?;
        debug!(
            path = %path.display(),
            added = self.table.len(),
            total = stored.table.len(),
            "merged table"
        );
        Ok(stored.size())
    }
}

impl StrategyProvider for RegretMatchedStrategy {
    fn get_strategy(&self, infoset: &InfoSet, mask: &ActionMask) -> ActionRegrets {
        self.strategy_for_key(&infoset.bucket_key(), mask)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const ALL: ActionMask = ActionMask([true; NUM_ACTIONS]);

    #[test]
    fn regret_match_normalizes_positive_part() {
        let regrets = [2.0, -5.0, 0.0, 6.0, 0.0, 0.0];
        let p = regret_match(&regrets, &ALL, DEFAULT_UNIFORM_THRESHOLD);
        assert_relative_eq!(p[0], 0.25);
        assert_relative_eq!(p[3], 0.75);
        assert_eq!(p[1], 0.0);
    }

    #[test]
    fn negative_regrets_fall_back_to_uniform() {
        let mask = ActionMask([true, true, false, false, false, false]);
        let p = regret_match(&[-1.0, -3.0, 9.0, 0.0, 0.0, 0.0], &mask, 1e-3);
        assert_eq!(p, [0.5, 0.5, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn temp_path_is_a_sibling() {
        let p = temp_path(Path::new("out/regrets_0.bin"));
        assert_eq!(p, PathBuf::from("out/regrets_0.bin.tmp"));
    }

    #[test]
    fn add_regret_creates_then_accumulates() {
        let mut s = RegretMatchedStrategy::new();
        s.add_regret_key("k", &[1.0; NUM_ACTIONS]);
        s.add_regret_key("k", &[0.5; NUM_ACTIONS]);
        assert_eq!(s.size(), 1);
        assert_eq!(s.get_regret("k"), Some(&[1.5; NUM_ACTIONS]));
    }
}
