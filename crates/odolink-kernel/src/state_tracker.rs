//! [`StateTracker`] – frame-to-frame counter deltas.
//!
//! The controller reports cumulative pulse counts.  The tracker remembers
//! the previous value of each [`TrackedCounter`] and turns every accepted
//! frame into a [`DiffSet`].  Slots start at zero, so the first frame's
//! diffs equal its absolute counts.

use odolink_types::{CounterSet, DiffSet, TelemetryError, TelemetryFields, TrackedCounter};

/// Owner of the previous-cycle counters.
#[derive(Debug, Clone, Default)]
pub struct StateTracker {
    previous: CounterSet,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the diffs of `fields` and make its counters the new
    /// baseline.
    ///
    /// Either all six slots are replaced or none is: every counter is read
    /// and validated before the first write.
    pub fn advance(&mut self, fields: &TelemetryFields) -> Result<DiffSet, TelemetryError> {
        let mut current = CounterSet::default();
        for counter in TrackedCounter::ALL {
            let value = fields.integer(counter.field_name()).ok_or_else(|| {
                TelemetryError::Unexpected(format!(
                    "tracked counter {} missing or not an integer",
                    counter.field_name()
                ))
            })?;
            current.set(counter, value);
        }

        let mut diffs = DiffSet::default();
        for (counter, value) in current.iter() {
            diffs.set(counter, value.wrapping_sub(self.previous.get(counter)));
        }
        self.previous = current;
        Ok(diffs)
    }

    /// Copy of the current baseline.
    pub fn previous(&self) -> CounterSet {
        self.previous
    }
}
