//! Metric name and label definitions.
//!
//! Every metric the installer emits is named here so the exported set is
//! documented in one place.

/// Install/remove orchestration
pub mod installer {
    /// Install attempts, labelled by outcome
    pub const INSTALL_ATTEMPTS_TOTAL: &str = "uasp_install_attempts_total";
    /// Installs that aborted before or during the project-store write
    pub const INSTALL_ERRORS_TOTAL: &str = "uasp_install_errors_total";
    /// Install duration in seconds, fetch included
    pub const INSTALL_DURATION_SECONDS: &str = "uasp_install_duration_seconds";
    /// Installs skipped because the recorded version already matched
    pub const INSTALL_UP_TO_DATE_TOTAL: &str = "uasp_install_up_to_date_total";
    /// Successful removals
    pub const REMOVE_TOTAL: &str = "uasp_remove_total";
}

/// Content fetching
pub mod fetch {
    /// Fetch failures, labelled by kind (`not_found`, `timeout`, `io`)
    pub const ERRORS_TOTAL: &str = "uasp_fetch_errors_total";
}

/// Per-user host store
pub mod host_store {
    /// Best-effort host-store writes that failed and were downgraded to warnings
    pub const FAILURES_TOTAL: &str = "uasp_host_store_failures_total";
    /// Farm links created or refreshed
    pub const LINKS_REFRESHED_TOTAL: &str = "uasp_host_store_links_refreshed_total";
}

/// Common label keys
pub mod labels {
    pub const OUTCOME: &str = "outcome";
    pub const KIND: &str = "kind";
}

/// Histogram bucket boundaries
pub mod buckets {
    /// Install duration buckets (in seconds), 5ms to 2 minutes
    pub const INSTALL_DURATION: [f64; 11] = [
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0, 30.0, 120.0,
    ];
}
