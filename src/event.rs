//! Recurring table events.
//!
//! A `ModifiersTable` carries named countdown/every-N triggers. Time only
//! moves when the host calls `trigger(name)`; each matching record counts
//! the call, fires its action every `every`-th call and retires once it has
//! fired `times` times.

use serde::{Deserialize, Serialize};

/// What a scheduled event does to its table when it fires.
///
/// Deserializes from the `action` field of an event definition:
///
/// ```rust
/// use statstack::EventAction;
///
/// let action: EventAction =
///     serde_json::from_str(r#"{"action": "fade", "amount": 0.5}"#).unwrap();
/// assert_eq!(action, EventAction::Fade { amount: 0.5, destroy: None });
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum EventAction {
    /// Re-enable the table.
    Activate,
    /// Disable the table without removing it.
    Deactivate,
    /// Destroy the table; its owner sweeps it on the next pass.
    Remove,
    /// Move every fadable operand `amount` closer to its operator's neutral.
    ///
    /// Once everything is neutral the table is destroyed unless `destroy`
    /// is `Some(false)`.
    Fade {
        amount: f64,
        #[serde(default)]
        destroy: Option<bool>,
    },
}

fn one() -> u32 {
    1
}

/// Authoring form of an event: `{name, times?, every?, action, ...params}`.
///
/// `times` defaults to 1; `0` repeats forever. `every` defaults to 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSpec {
    pub name: String,
    #[serde(default = "one")]
    pub times: u32,
    #[serde(default = "one")]
    pub every: u32,
    #[serde(flatten)]
    pub action: EventAction,
}

/// A scheduled event inside a table.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEvent {
    pub action: EventAction,
    pub times: u32,
    pub every: u32,
    pub count: u32,
    pub done: bool,
}

impl ScheduledEvent {
    pub fn new(action: EventAction, times: u32, every: u32) -> Self {
        Self {
            action,
            times,
            every: every.max(1),
            count: 0,
            done: false,
        }
    }

    /// Count one trigger. Returns whether the action fires on this call.
    pub(crate) fn tick(&mut self) -> bool {
        self.count += 1;
        self.count % self.every == 0
    }

    /// Whether the record has fired as many times as it was scheduled for.
    pub(crate) fn exhausted(&self) -> bool {
        self.times > 0 && self.count / self.every >= self.times
    }

    /// A fresh copy with the counter reset.
    pub(crate) fn rearmed(&self) -> Self {
        Self::new(self.action.clone(), self.times, self.every)
    }
}

impl From<&EventSpec> for ScheduledEvent {
    fn from(spec: &EventSpec) -> Self {
        ScheduledEvent::new(spec.action.clone(), spec.times, spec.every)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_and_times() {
        let mut event = ScheduledEvent::new(EventAction::Deactivate, 2, 3);
        let fired: Vec<bool> = (0..6).map(|_| event.tick()).collect();
        assert_eq!(fired, vec![false, false, true, false, false, true]);
        assert!(event.exhausted());
    }

    #[test]
    fn test_zero_times_never_exhausts() {
        let mut event = ScheduledEvent::new(EventAction::Activate, 0, 1);
        for _ in 0..100 {
            assert!(event.tick());
        }
        assert!(!event.exhausted());
    }

    #[test]
    fn test_spec_defaults() {
        let spec: EventSpec =
            serde_json::from_str(r#"{"name": "turn", "action": "remove"}"#).unwrap();
        assert_eq!(spec.times, 1);
        assert_eq!(spec.every, 1);
        assert_eq!(spec.action, EventAction::Remove);
    }
}
