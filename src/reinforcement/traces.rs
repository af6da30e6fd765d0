// Eligibility traces for TD(λ)
// One set per episode; never shared between searches

use std::collections::BTreeMap;

use crate::reinforcement::state::ValueKey;

/// Trace of one pair plus what it was recorded from
#[derive(Debug, Clone)]
struct Trace<T> {
    value: f64,
    origin: T,
}

/// Decaying credit of the (state, action) pairs visited in one episode
///
/// Each trace carries the `origin` it was last replaced with, so later
/// updates can still describe the step that earned the credit.
#[derive(Debug, Clone)]
pub struct EligibilityTraceSet<T = ()> {
    traces: BTreeMap<ValueKey, Trace<T>>,
    threshold: f64,
    max_traces: usize,
}

impl<T> EligibilityTraceSet<T> {
    pub fn new(threshold: f64, max_traces: usize) -> Self {
        Self {
            traces: BTreeMap::new(),
            threshold,
            max_traces,
        }
    }

    /// Set the trace of a pair to 1.0, replacing any previous value and origin
    pub fn replace(&mut self, key: ValueKey, origin: T) {
        self.traces.insert(key, Trace { value: 1.0, origin });
    }

    pub fn get(&self, key: &ValueKey) -> Option<f64> {
        self.traces.get(key).map(|trace| trace.value)
    }

    /// Number of traces above the threshold
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Apply `update` to every live trace, then decay it by `factor`
    ///
    /// Traces below the threshold are dropped without being applied, and
    /// traces that fall below it after decaying are dropped too.
    pub fn apply_and_decay<E>(
        &mut self,
        factor: f64,
        mut update: impl FnMut(&ValueKey, f64, &T) -> Result<(), E>,
    ) -> Result<(), E> {
        let threshold = self.threshold;
        self.traces.retain(|_, trace| trace.value.abs() >= threshold);

        for (key, trace) in self.traces.iter_mut() {
            update(key, trace.value, &trace.origin)?;
            trace.value *= factor;
        }

        self.traces.retain(|_, trace| trace.value.abs() >= threshold);
        Ok(())
    }

    /// Keep only the `max_traces` strongest traces
    pub fn enforce_cap(&mut self) {
        if self.traces.len() <= self.max_traces {
            return;
        }

        let mut ranked: Vec<(ValueKey, Trace<T>)> =
            std::mem::take(&mut self.traces).into_iter().collect();
        // Stable sort keeps key order among equal magnitudes
        ranked.sort_by(|a, b| b.1.value.abs().total_cmp(&a.1.value.abs()));
        ranked.truncate(self.max_traces);
        self.traces = ranked.into_iter().collect();
    }
}
