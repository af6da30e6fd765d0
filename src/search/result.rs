use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{EngineError, EngineResult};
use crate::graph::NodeId;
use crate::reinforcement::action::Experience;

/// Outcome of one search, whichever strategy produced it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    /// Best path found, in walk order
    pub path: Vec<NodeId>,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
    pub relevance: f64,
    pub explanation: String,
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Transitions observed while searching
    pub experiences: Vec<Experience>,
}

impl SearchResult {
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Last node of the path, if any
    pub fn destination(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }
}

/// Why a search loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Step or iteration budget used up
    Exhausted,
    /// A step reward crossed the high-confidence threshold
    StrongMatch,
    /// The walk kept returning to the same node
    Cycle,
    /// The current node had no neighbors
    DeadEnd,
    Cancelled,
    DeadlineExceeded,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::Exhausted => "exhausted",
            StopReason::StrongMatch => "strong_match",
            StopReason::Cycle => "cycle",
            StopReason::DeadEnd => "dead_end",
            StopReason::Cancelled => "cancelled",
            StopReason::DeadlineExceeded => "deadline_exceeded",
        }
    }

    /// Map a recoverable error to the stop reason it stands for
    pub fn from_error(err: &EngineError) -> Option<Self> {
        match err {
            EngineError::NoActionsAvailable { .. } => Some(StopReason::DeadEnd),
            EngineError::Cancelled => Some(StopReason::Cancelled),
            EngineError::DeadlineExceeded => Some(StopReason::DeadlineExceeded),
            _ => None,
        }
    }
}

/// Experiences of a running search, readable while it is still going
#[derive(Debug, Clone, Default)]
pub struct ExperienceLog {
    inner: Arc<Mutex<Vec<Experience>>>,
}

impl ExperienceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, experience: Experience) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(experience);
    }

    /// Copy of everything recorded so far
    pub fn snapshot(&self) -> Vec<Experience> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Deadline, cancellation and progress reporting for one search call
#[derive(Debug, Clone, Default)]
pub struct SearchControl {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
    log: Option<ExperienceLog>,
}

impl SearchControl {
    /// No deadline, not cancellable
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Record experiences into a log the caller can read mid-search
    pub fn with_experience_log(mut self, log: ExperienceLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Earliest of the caller's deadline and `budget` from now
    pub fn deadline_within(&self, budget: Duration) -> Instant {
        let budget_deadline = Instant::now() + budget;
        match self.deadline {
            Some(deadline) => deadline.min(budget_deadline),
            None => budget_deadline,
        }
    }

    /// Fails with `Cancelled` or `DeadlineExceeded` once the call should stop
    pub fn check(&self) -> EngineResult<()> {
        if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(EngineError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(EngineError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Log to record into: the caller's, or a fresh private one
    pub fn experience_log(&self) -> ExperienceLog {
        self.log.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_control_never_stops() {
        assert!(SearchControl::unbounded().check().is_ok());
    }

    #[test]
    fn test_cancellation_is_reported() {
        let token = CancellationToken::new();
        let control = SearchControl::unbounded().with_cancellation(token.clone());
        assert!(control.check().is_ok());
        token.cancel();
        assert!(matches!(control.check(), Err(EngineError::Cancelled)));
    }

    #[test]
    fn test_past_deadline_is_reported() {
        let control = SearchControl::unbounded().with_deadline(Instant::now());
        assert!(matches!(control.check(), Err(EngineError::DeadlineExceeded)));
    }

    #[test]
    fn test_deadline_within_takes_the_earliest() {
        let soon = Instant::now() + Duration::from_millis(10);
        let control = SearchControl::unbounded().with_deadline(soon);
        assert_eq!(control.deadline_within(Duration::from_secs(60)), soon);
        assert!(SearchControl::unbounded().deadline_within(Duration::from_secs(60)) > soon);
    }

    #[test]
    fn test_stop_reason_from_error() {
        assert_eq!(
            StopReason::from_error(&EngineError::no_actions("n")),
            Some(StopReason::DeadEnd)
        );
        assert_eq!(StopReason::from_error(&EngineError::persistence("x")), None);
    }

    #[test]
    fn test_shared_log_is_visible_to_caller() {
        let log = ExperienceLog::new();
        let control = SearchControl::unbounded().with_experience_log(log.clone());
        assert!(control.experience_log().is_empty());
        assert!(SearchControl::unbounded().experience_log().is_empty());
        assert_eq!(log.len(), 0);
    }
}
