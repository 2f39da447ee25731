use std::time::Duration;

/// Configuration for the orchestration core.
///
/// Defaults match the production behavior: elapsed maintenance windows move
/// forward by the maintenance-days progression (no fixed delay), scheduling
/// errors back off for a day, and list endpoints page at 100 records.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Fixed delay applied when an elapsed maintenance window is rescheduled.
    ///
    /// `Duration::ZERO` selects the maintenance-days progression instead: the
    /// window moves to the next allowed weekday.
    pub reschedule_delay: Duration,

    /// Backstop delay used when evaluating or persisting a maintenance window
    /// fails; the operation is re-enqueued after this delay rather than
    /// dropped.
    pub reschedule_error_delay: Duration,

    /// Upper bound on the page size accepted by the list endpoints.
    pub default_max_page: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            reschedule_delay: Duration::ZERO,
            reschedule_error_delay: Duration::from_secs(24 * 60 * 60),
            default_max_page: 100,
        }
    }
}
