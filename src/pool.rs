//! Depletable resources.
//!
//! A `Pool` is a resource such as hit points or mana: modifiers raise or
//! lower its ceiling, spending accumulates in `used`, and an optional
//! reserve buffer can be balanced back into it. A `Gauge` is the simpler
//! bounded counterpart that only tracks a current value between `min` and
//! its modified maximum.

use crate::stat::ModifierSource;
use crate::value::{Rounding, EPSILON};
use serde::{Deserialize, Serialize};

/// Construction options for a [`Pool`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PoolOptions {
    pub base: f64,
    pub used: f64,
    pub reserve_factor: f64,
    pub reserve_used: f64,
    /// `lose` may push `used` past the maximum.
    pub internal_overuse: bool,
    /// `gain` may push `used` below zero.
    pub internal_overflow: bool,
    /// The reading may go below zero.
    pub actual_overuse: bool,
    /// The reading may exceed the maximum.
    pub actual_overflow: bool,
    pub actual_round: Rounding,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            base: 0.0,
            used: 0.0,
            reserve_factor: 0.0,
            reserve_used: 0.0,
            internal_overuse: false,
            internal_overflow: false,
            actual_overuse: false,
            actual_overflow: false,
            actual_round: Rounding::None,
        }
    }
}

/// A depletable numeric resource with allocation and an optional reserve.
///
/// Every reading takes a [`ModifierSource`] so the pool's ceiling reflects
/// whatever modifiers its owning table has stacked on it.
///
/// # Examples
///
/// ```rust
/// use statstack::{Pool, Unmodified};
///
/// let mut pool = Pool::new(8.0);
/// assert_eq!(pool.lose(5.0, None, &Unmodified), 5.0);
/// assert_eq!(pool.actual(&Unmodified), 3.0);
/// assert_eq!(pool.replenish(), 5.0);
/// assert_eq!(pool.actual(&Unmodified), 8.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    base: f64,
    used: f64,
    allocated: f64,
    reserve_factor: f64,
    reserve_used: f64,
    internal_overuse: bool,
    internal_overflow: bool,
    actual_overuse: bool,
    actual_overflow: bool,
    actual_round: Rounding,
}

impl Pool {
    pub fn new(base: f64) -> Self {
        Self::from_options(PoolOptions {
            base,
            ..PoolOptions::default()
        })
    }

    pub fn from_options(options: PoolOptions) -> Self {
        Self {
            base: options.base,
            used: options.used,
            allocated: 0.0,
            reserve_factor: options.reserve_factor.max(0.0),
            reserve_used: options.reserve_used,
            internal_overuse: options.internal_overuse,
            internal_overflow: options.internal_overflow,
            actual_overuse: options.actual_overuse,
            actual_overflow: options.actual_overflow,
            actual_round: options.actual_round,
        }
    }

    pub fn base(&self) -> f64 {
        self.base
    }

    pub fn set_base(&mut self, base: f64) {
        self.base = base;
    }

    pub fn used(&self) -> f64 {
        self.used
    }

    pub fn allocated(&self) -> f64 {
        self.allocated
    }

    pub fn reserve_used(&self) -> f64 {
        self.reserve_used
    }

    pub fn reserve_factor(&self) -> f64 {
        self.reserve_factor
    }

    /// The pool's ceiling: the base with modifiers applied.
    pub fn max(&self, mods: &dyn ModifierSource) -> f64 {
        mods.modify_number(self.base)
    }

    /// Current reading, clamped and rounded per the pool's policy.
    pub fn actual(&self, mods: &dyn ModifierSource) -> f64 {
        let max = self.max(mods);
        let mut value = max - self.used;
        if !self.actual_overflow {
            value = value.min(max);
        }
        if !self.actual_overuse {
            value = value.max(0.0);
        }
        self.actual_round.apply(value)
    }

    /// Headroom left for spending, allocations included.
    pub fn available(&self, mods: &dyn ModifierSource) -> f64 {
        (self.max(mods) - self.used - self.allocated).max(0.0)
    }

    /// Consume up to `value`. Without overuse the loss is truncated to the
    /// available headroom. Returns the amount actually consumed.
    pub fn lose(&mut self, value: f64, overuse: Option<bool>, mods: &dyn ModifierSource) -> f64 {
        if value <= 0.0 {
            return 0.0;
        }
        let applied = if overuse.unwrap_or(self.internal_overuse) {
            value
        } else {
            value.min(self.available(mods))
        };
        self.used += applied;
        applied
    }

    /// Give back up to `value`. Without overflow the gain is truncated to
    /// what has been used. Returns the amount actually regained.
    pub fn gain(&mut self, value: f64, overflow: Option<bool>) -> f64 {
        if value <= 0.0 {
            return 0.0;
        }
        let applied = if overflow.unwrap_or(self.internal_overflow) {
            value
        } else {
            value.min(self.used.max(0.0))
        };
        self.used -= applied;
        applied
    }

    /// Consume exactly `value`, or nothing at all if the pool cannot cover it.
    pub fn spend(&mut self, value: f64, mods: &dyn ModifierSource) -> bool {
        if value < 0.0 || value > self.available(mods) + EPSILON {
            return false;
        }
        self.used += value;
        true
    }

    /// Give back exactly `value`, or nothing if less than that has been used.
    /// Returns the amount restored.
    pub fn restore(&mut self, value: f64) -> f64 {
        if value <= 0.0 || value > self.used + EPSILON {
            return 0.0;
        }
        self.used -= value;
        value
    }

    /// Refill completely. Returns how much had been used.
    pub fn replenish(&mut self) -> f64 {
        let used = self.used;
        self.used = 0.0;
        used
    }

    /// Empty completely. Returns how much was consumed.
    pub fn deplete(&mut self, mods: &dyn ModifierSource) -> f64 {
        let max = self.max(mods);
        let consumed = (max - self.used).max(0.0);
        self.used = self.used.max(max);
        consumed
    }

    /// Earmark `value` without consuming it. Fails when the headroom left
    /// after earlier allocations cannot cover it.
    pub fn allocate(&mut self, value: f64, mods: &dyn ModifierSource) -> bool {
        if value < 0.0 || value > self.available(mods) + EPSILON {
            return false;
        }
        self.allocated += value;
        true
    }

    /// Turn every allocation into real use. Returns the committed amount.
    pub fn commit(&mut self) -> f64 {
        let committed = self.allocated;
        self.used += committed;
        self.allocated = 0.0;
        committed
    }

    /// Drop every allocation. Returns the released amount.
    pub fn cancel_allocation(&mut self) -> f64 {
        std::mem::take(&mut self.allocated)
    }

    /// Size of the reserve buffer.
    pub fn reserve_max(&self, mods: &dyn ModifierSource) -> f64 {
        self.reserve_factor * self.max(mods)
    }

    pub fn reserve_actual(&self, mods: &dyn ModifierSource) -> f64 {
        (self.reserve_max(mods) - self.reserve_used).max(0.0)
    }

    /// Move reserve into the pool so both end up equally depleted in
    /// proportion to their size. Returns the transferred amount.
    pub fn balance(&mut self, mods: &dyn ModifierSource) -> f64 {
        let max = self.max(mods);
        let reserve = self.reserve_factor * max;
        if max <= 0.0 || reserve <= 0.0 {
            return 0.0;
        }
        // (max - (used - x)) / max == (reserve - (reserve_used + x)) / reserve
        let x = (reserve * self.used - max * self.reserve_used) / (max + reserve);
        let ceiling = self.used.min(reserve - self.reserve_used).max(0.0);
        let x = self.actual_round.apply(x).clamp(0.0, ceiling);
        if x <= 0.0 {
            return 0.0;
        }
        self.used -= x;
        self.reserve_used += x;
        x
    }

    /// Forgive debt once both the pool and its reserve are exhausted.
    pub fn clean_up(&mut self, mods: &dyn ModifierSource) {
        let max = self.max(mods);
        let reserve = self.reserve_factor * max;
        if self.used >= max && self.reserve_used >= reserve {
            self.used = self.used.min(max);
            self.reserve_used = self.reserve_used.min(reserve);
        }
    }
}

/// Construction options for a [`Gauge`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GaugeOptions {
    pub base: f64,
    pub min: f64,
    /// Starting value; full when absent.
    pub value: Option<f64>,
}

impl Default for GaugeOptions {
    fn default() -> Self {
        Self {
            base: 0.0,
            min: 0.0,
            value: None,
        }
    }
}

/// A value that moves between `min` and its modified base.
///
/// # Examples
///
/// ```rust
/// use statstack::{Gauge, Unmodified};
///
/// let mut gauge = Gauge::new(8.0);
/// assert_eq!(gauge.add(-50.0, &Unmodified), -8.0);
/// assert_eq!(gauge.actual(&Unmodified), 0.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gauge {
    base: f64,
    min: f64,
    /// Distance below the maximum.
    lost: f64,
}

impl Gauge {
    pub fn new(base: f64) -> Self {
        Self {
            base,
            min: 0.0,
            lost: 0.0,
        }
    }

    pub fn from_options(options: GaugeOptions) -> Self {
        let lost = options.value.map_or(0.0, |v| options.base - v);
        Self {
            base: options.base,
            min: options.min,
            lost,
        }
    }

    pub fn base(&self) -> f64 {
        self.base
    }

    pub fn set_base(&mut self, base: f64) {
        self.base = base;
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self, mods: &dyn ModifierSource) -> f64 {
        mods.modify_number(self.base)
    }

    pub fn actual(&self, mods: &dyn ModifierSource) -> f64 {
        let max = self.max(mods);
        (max - self.lost).min(max).max(self.min)
    }

    /// Move the gauge by `delta`, stopping at its bounds. Returns the change
    /// actually applied.
    pub fn add(&mut self, delta: f64, mods: &dyn ModifierSource) -> f64 {
        let max = self.max(mods);
        let current = self.actual(mods);
        let target = (current + delta).min(max).max(self.min);
        let applied = target - current;
        self.lost = max - target;
        applied
    }

    /// Set the current value, clamped to the gauge's bounds.
    pub fn set(&mut self, value: f64, mods: &dyn ModifierSource) {
        let max = self.max(mods);
        self.lost = max - value.min(max).max(self.min);
    }
}
