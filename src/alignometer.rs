//! Weighted alignment history.
//!
//! A `HistoryAlignometer` tracks something like a character's moral
//! alignment from a history of weighted deeds. Each deed pulls up, pulls
//! down, or simply contributes its value. The reading is a weighted mean of
//! the most recent deeds in which directional deeds only count while they
//! still pull the mean their way.

use crate::stat::ModifierSource;
use crate::value::EPSILON;
use serde::{Deserialize, Serialize};

/// Which way an entry is allowed to move the reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    /// Only counts while its value is above the reading.
    Up,
    /// Only counts while its value is below the reading.
    Down,
    /// Always counts.
    #[default]
    Both,
}

impl Direction {
    /// Numeric form: `1`, `-1` or `0`.
    pub fn sign(self) -> i8 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
            Direction::Both => 0,
        }
    }

    pub fn from_sign(sign: i8) -> Self {
        match sign.signum() {
            1 => Direction::Up,
            -1 => Direction::Down,
            _ => Direction::Both,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignEntry {
    pub direction: Direction,
    pub value: f64,
    pub weight: f64,
    pub description: String,
}

impl Default for AlignEntry {
    fn default() -> Self {
        Self {
            direction: Direction::Both,
            value: 0.0,
            weight: 1.0,
            description: String::new(),
        }
    }
}

/// Construction options for a [`HistoryAlignometer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AlignometerOptions {
    pub base: f64,
    pub min: f64,
    pub max: f64,
    /// Below this much evidence the reading is padded with the base.
    pub min_weight: f64,
    /// Weight window used by [`HistoryAlignometer::instant`].
    pub instant_max_weight: f64,
    /// Oldest entries are dropped beyond this count; `0` keeps everything.
    pub max_entries: usize,
    pub entries: Vec<AlignEntry>,
}

impl Default for AlignometerOptions {
    fn default() -> Self {
        Self {
            base: 0.0,
            min: -100.0,
            max: 100.0,
            min_weight: 10.0,
            instant_max_weight: 10.0,
            max_entries: 0,
            entries: Vec::new(),
        }
    }
}

/// A bounded weighted average over a history of directional entries.
///
/// # Examples
///
/// ```rust
/// use statstack::{AlignometerOptions, Direction, HistoryAlignometer, Unmodified};
///
/// let mut karma = HistoryAlignometer::from_options(AlignometerOptions {
///     min_weight: 4.0,
///     ..AlignometerOptions::default()
/// });
/// karma.add(Direction::Both, 40.0, 1.0, "saved a cat");
///
/// // One deed of weight 1, padded with the base (0) at weight 3.
/// assert_eq!(karma.actual(&Unmodified), 10.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryAlignometer {
    base: f64,
    min: f64,
    max: f64,
    min_weight: f64,
    instant_max_weight: f64,
    max_entries: usize,
    entries: Vec<AlignEntry>,
}

impl HistoryAlignometer {
    pub fn new(base: f64) -> Self {
        Self::from_options(AlignometerOptions {
            base,
            ..AlignometerOptions::default()
        })
    }

    pub fn from_options(options: AlignometerOptions) -> Self {
        let mut meter = Self {
            base: options.base,
            min: options.min.min(options.max),
            max: options.max.max(options.min),
            min_weight: options.min_weight.max(0.0),
            instant_max_weight: options.instant_max_weight.max(0.0),
            max_entries: options.max_entries,
            entries: Vec::new(),
        };
        for entry in options.entries {
            meter.add(entry.direction, entry.value, entry.weight, entry.description);
        }
        meter
    }

    pub fn base(&self) -> f64 {
        self.base
    }

    pub fn set_base(&mut self, base: f64) {
        self.base = base;
    }

    pub fn entries(&self) -> &[AlignEntry] {
        &self.entries
    }

    /// Record a deed. The value is clamped to the meter's range.
    pub fn add(
        &mut self,
        direction: Direction,
        value: f64,
        weight: f64,
        description: impl Into<String>,
    ) {
        if weight <= 0.0 {
            return;
        }
        self.entries.push(AlignEntry {
            direction,
            value: value.clamp(self.min, self.max),
            weight,
            description: description.into(),
        });
        if self.max_entries > 0 && self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;
            self.entries.drain(..excess);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Reading over the whole history.
    pub fn actual(&self, mods: &dyn ModifierSource) -> f64 {
        self.actual_within(f64::INFINITY, mods)
    }

    /// Reading over the most recent `instant_max_weight` of history.
    pub fn instant(&self, mods: &dyn ModifierSource) -> f64 {
        self.actual_within(self.instant_max_weight, mods)
    }

    /// Reading over the most recent `limit` weight of history.
    pub fn actual_within(&self, limit: f64, mods: &dyn ModifierSource) -> f64 {
        let base = mods.modify_number(self.base);
        let mut sum = 0.0;
        let mut weight_sum = 0.0;
        let mut collected = 0.0;
        let mut ups: Vec<(f64, f64)> = Vec::new();
        let mut downs: Vec<(f64, f64)> = Vec::new();

        for entry in self.entries.iter().rev() {
            if collected >= limit {
                break;
            }
            let weight = entry.weight.min(limit - collected);
            collected += weight;
            match entry.direction {
                Direction::Both => {
                    sum += entry.value * weight;
                    weight_sum += weight;
                }
                Direction::Up => ups.push((entry.value, weight)),
                Direction::Down => downs.push((entry.value, weight)),
            }
        }

        if collected < self.min_weight {
            let pad = self.min_weight - collected;
            sum += base * pad;
            weight_sum += pad;
        }

        let mut average = if weight_sum > EPSILON {
            sum / weight_sum
        } else {
            base
        };

        // Entries that cannot pull the mean their way stay pending until the
        // mean moves past them.
        loop {
            let nearest_up = ups
                .iter()
                .enumerate()
                .filter(|(_, (v, _))| *v > average)
                .map(|(i, &(v, _))| (i, v - average))
                .min_by(|a, b| a.1.total_cmp(&b.1));
            let nearest_down = downs
                .iter()
                .enumerate()
                .filter(|(_, (v, _))| *v < average)
                .map(|(i, &(v, _))| (i, average - v))
                .min_by(|a, b| a.1.total_cmp(&b.1));
            let (value, weight) = match (nearest_up, nearest_down) {
                (Some((i, up)), Some((_, down))) if up <= down => ups.swap_remove(i),
                (Some((i, _)), None) => ups.swap_remove(i),
                (_, Some((j, _))) => downs.swap_remove(j),
                (None, None) => break,
            };
            sum += value * weight;
            weight_sum += weight;
            average = sum / weight_sum;
        }

        average.clamp(self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stat::Unmodified;

    fn meter(min_weight: f64) -> HistoryAlignometer {
        HistoryAlignometer::from_options(AlignometerOptions {
            min_weight,
            instant_max_weight: 2.0,
            ..AlignometerOptions::default()
        })
    }

    #[test]
    fn test_neutral_entries_are_weighted_mean_with_padding() {
        let mut m = meter(10.0);
        m.add(Direction::Both, 50.0, 2.0, "a");
        m.add(Direction::Both, -20.0, 3.0, "b");
        // (100 - 60 + 0 * 5) / 10
        assert!((m.actual(&Unmodified) - 4.0).abs() < 1e-9);

        let mut plain = meter(0.0);
        plain.add(Direction::Both, 50.0, 2.0, "a");
        plain.add(Direction::Both, -20.0, 3.0, "b");
        assert!((plain.actual(&Unmodified) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_reads_base() {
        let m = HistoryAlignometer::new(25.0);
        assert_eq!(m.actual(&Unmodified), 25.0);
    }

    #[test]
    fn test_up_entry_below_average_is_ignored() {
        let mut m = meter(0.0);
        m.add(Direction::Both, 50.0, 1.0, "anchor");
        m.add(Direction::Up, 10.0, 1.0, "weak praise");
        assert_eq!(m.actual(&Unmodified), 50.0);
        m.add(Direction::Down, 10.0, 1.0, "small sin");
        assert_eq!(m.actual(&Unmodified), 30.0);
    }

    #[test]
    fn test_directional_absorbs_nearest_first() {
        let mut m = meter(0.0);
        m.add(Direction::Both, 0.0, 1.0, "anchor");
        m.add(Direction::Up, 90.0, 1.0, "hero");
        m.add(Direction::Up, 30.0, 1.0, "kind");
        // 30 joins first (avg 15), then 90 (avg 40).
        assert!((m.actual(&Unmodified) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_opposing_directions_converge() {
        let mut m = meter(0.0);
        m.add(Direction::Up, 60.0, 1.0, "up");
        m.add(Direction::Down, -20.0, 1.0, "down");
        // Starting from base 0 the down entry (distance 20) joins first,
        // then the up entry pulls the mean to 20.
        assert!((m.actual(&Unmodified) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_passed_entries_rejoin_later() {
        let mut m = meter(0.0);
        m.add(Direction::Both, 20.0, 1.0, "anchor");
        m.add(Direction::Up, 10.0, 1.0, "faint praise");
        m.add(Direction::Down, -100.0, 1.0, "betrayal");
        // The betrayal drags the mean to -40, below the praise, which then
        // pulls it back up.
        assert!((m.actual(&Unmodified) - (-70.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_weight_limit_clips_boundary_entry() {
        let mut m = meter(0.0);
        m.add(Direction::Both, 100.0, 5.0, "old");
        m.add(Direction::Both, 0.0, 1.0, "new");
        // Window of 2: the new entry plus 1 weight of the old one.
        assert!((m.instant(&Unmodified) - 50.0).abs() < 1e-9);
        assert!((m.actual_within(6.0, &Unmodified) - 500.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_values_clamped_to_range() {
        let mut m = meter(0.0);
        m.add(Direction::Both, 1000.0, 1.0, "absurd");
        assert_eq!(m.entries()[0].value, 100.0);
        assert_eq!(m.actual(&Unmodified), 100.0);
    }
}
