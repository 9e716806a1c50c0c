//! Weighted history gauge.
//!
//! A `HistoryGauge` keeps every change applied to it as a weighted entry,
//! so damage from different causes can be healed separately. The weight of
//! an entry is how hard it is to recover: recovering `v` against an entry
//! of weight `w` removes `v / w` from it.

use crate::stat::ModifierSource;
use crate::value::EPSILON;
use serde::{Deserialize, Serialize};

/// One recorded change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryEntry {
    pub value: f64,
    pub weight: f64,
    pub description: String,
}

impl Default for HistoryEntry {
    fn default() -> Self {
        Self {
            value: 0.0,
            weight: 1.0,
            description: String::new(),
        }
    }
}

/// Construction options for a [`HistoryGauge`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistoryOptions {
    pub base: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Oldest entries are dropped beyond this count; `0` keeps everything.
    pub max_entries: usize,
    pub entries: Vec<HistoryEntry>,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            base: 0.0,
            min: None,
            max: None,
            max_entries: 0,
            entries: Vec::new(),
        }
    }
}

/// A numeric stat whose value is its base plus a ledger of weighted entries.
///
/// # Examples
///
/// ```rust
/// use statstack::{HistoryGauge, HistoryOptions, Unmodified};
///
/// let mut hp = HistoryGauge::from_options(HistoryOptions {
///     base: 100.0,
///     min: Some(0.0),
///     max: Some(100.0),
///     ..HistoryOptions::default()
/// });
/// hp.add(-10.0, 1.0, "A");
/// hp.add(-20.0, 1.0, "B");
/// hp.recover(20.0);
///
/// assert_eq!(hp.entries().len(), 1);
/// assert_eq!(hp.entries()[0].description, "B");
/// assert_eq!(hp.actual(&Unmodified), 90.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryGauge {
    base: f64,
    min: Option<f64>,
    max: Option<f64>,
    max_entries: usize,
    entries: Vec<HistoryEntry>,
}

fn weight_or_default(weight: f64) -> f64 {
    if weight > 0.0 {
        weight
    } else {
        1.0
    }
}

impl HistoryGauge {
    pub fn new(base: f64) -> Self {
        Self::from_options(HistoryOptions {
            base,
            ..HistoryOptions::default()
        })
    }

    pub fn from_options(options: HistoryOptions) -> Self {
        let mut gauge = Self {
            base: options.base,
            min: options.min,
            max: options.max,
            max_entries: options.max_entries,
            entries: Vec::new(),
        };
        for entry in options.entries {
            gauge.add(entry.value, entry.weight, entry.description);
        }
        gauge
    }

    pub fn base(&self) -> f64 {
        self.base
    }

    pub fn set_base(&mut self, base: f64) {
        self.base = base;
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Sum of every entry's value.
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.value).sum()
    }

    pub fn actual(&self, mods: &dyn ModifierSource) -> f64 {
        let mut value = mods.modify_number(self.base) + self.total();
        if let Some(max) = self.max {
            value = value.min(max);
        }
        if let Some(min) = self.min {
            value = value.max(min);
        }
        value
    }

    /// Append an entry. Zero values are ignored.
    pub fn add(&mut self, value: f64, weight: f64, description: impl Into<String>) {
        if value.abs() <= EPSILON {
            return;
        }
        self.entries.push(HistoryEntry {
            value,
            weight: weight_or_default(weight),
            description: description.into(),
        });
        self.trim();
    }

    /// Add into an existing entry with the same weight, description and
    /// sign, or append a new one.
    pub fn add_merge(&mut self, value: f64, weight: f64, description: impl Into<String>) {
        if value.abs() <= EPSILON {
            return;
        }
        let weight = weight_or_default(weight);
        let description = description.into();
        let existing = self.entries.iter_mut().find(|e| {
            (e.weight - weight).abs() <= EPSILON
                && e.description == description
                && e.value.signum() == value.signum()
        });
        match existing {
            Some(entry) => entry.value += value,
            None => self.add(value, weight, description),
        }
    }

    /// Work `value` off against entries of the opposite sign, easiest
    /// (lowest weight) first. Returns the magnitude removed from entries.
    pub fn recover(&mut self, value: f64) -> f64 {
        let sign = value.signum();
        let mut remaining = value.abs();
        let mut recovered = 0.0;

        while remaining > EPSILON {
            let target = self
                .entries
                .iter()
                .enumerate()
                .filter(|(_, e)| e.value.signum() == -sign && e.value.abs() > EPSILON)
                .fold(None::<(usize, f64)>, |best, (i, e)| match best {
                    Some((_, w)) if w <= e.weight => best,
                    _ => Some((i, e.weight)),
                });
            let Some((idx, weight)) = target else {
                break;
            };
            let entry = &mut self.entries[idx];
            let needed = entry.value.abs() * weight;
            if remaining <= needed + EPSILON {
                let healed = (remaining / weight).min(entry.value.abs());
                entry.value += sign * healed;
                recovered += healed;
                break;
            }
            recovered += entry.value.abs();
            entry.value = 0.0;
            remaining -= needed;
        }

        self.entries.retain(|e| e.value.abs() > EPSILON);
        recovered
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn trim(&mut self) {
        if self.max_entries > 0 && self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;
            self.entries.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stat::Unmodified;

    fn gauge() -> HistoryGauge {
        HistoryGauge::from_options(HistoryOptions {
            base: 100.0,
            min: Some(0.0),
            max: Some(100.0),
            ..HistoryOptions::default()
        })
    }

    #[test]
    fn test_add_and_clamp() {
        let mut g = gauge();
        g.add(-30.0, 1.0, "fall");
        assert_eq!(g.actual(&Unmodified), 70.0);
        g.add(-200.0, 1.0, "dragon");
        assert_eq!(g.actual(&Unmodified), 0.0);
        g.add(0.0, 1.0, "nothing");
        assert_eq!(g.entries().len(), 2);
    }

    #[test]
    fn test_max_entries_drops_oldest() {
        let mut g = HistoryGauge::from_options(HistoryOptions {
            base: 10.0,
            max_entries: 2,
            ..HistoryOptions::default()
        });
        g.add(-1.0, 1.0, "a");
        g.add(-2.0, 1.0, "b");
        g.add(-3.0, 1.0, "c");
        let names: Vec<&str> = g.entries().iter().map(|e| e.description.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn test_add_merge_same_cause() {
        let mut g = gauge();
        g.add_merge(-5.0, 1.0, "poison");
        g.add_merge(-5.0, 1.0, "poison");
        g.add_merge(-5.0, 2.0, "poison");
        g.add_merge(3.0, 1.0, "poison");
        assert_eq!(g.entries().len(), 3);
        assert_eq!(g.entries()[0].value, -10.0);
    }

    #[test]
    fn test_recover_lowest_weight_first() {
        let mut g = gauge();
        g.add(-10.0, 3.0, "deep");
        g.add(-10.0, 1.0, "scratch");
        assert_eq!(g.recover(12.0), 10.0 + 2.0 / 3.0);
        assert_eq!(g.entries().len(), 1);
        assert_eq!(g.entries()[0].description, "deep");
        assert!((g.entries()[0].value - (-10.0 + 2.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_recover_never_overshoots() {
        let mut g = gauge();
        g.add(-4.0, 1.0, "a");
        g.add(-6.0, 1.0, "b");
        assert_eq!(g.recover(50.0), 10.0);
        assert!(g.entries().is_empty());
        assert_eq!(g.actual(&Unmodified), 100.0);
    }

    #[test]
    fn test_recover_ignores_same_sign() {
        let mut g = HistoryGauge::new(0.0);
        g.add(5.0, 1.0, "blessing");
        assert_eq!(g.recover(3.0), 0.0);
        assert_eq!(g.entries()[0].value, 5.0);
        assert_eq!(g.recover(-3.0), 3.0);
        assert_eq!(g.entries()[0].value, 2.0);
    }
}
