//! Board configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for a board view.
///
/// # Examples
///
/// ```
/// use gantry::board::services::BoardConfig;
/// use std::time::Duration;
///
/// let config = BoardConfig::default();
/// assert_eq!(config.status_update_timeout(), Duration::from_secs(15));
///
/// let parsed = BoardConfig::from_json(r#"{"status_update_timeout_ms": 500}"#)?;
/// assert_eq!(parsed.status_update_timeout(), Duration::from_millis(500));
/// assert!(parsed.hide_completed_candidates);
/// assert_eq!(parsed.refresh_timeout(), Duration::from_secs(15));
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// How long a status write may take before it counts as failed.
    pub status_update_timeout_ms: u64,
    /// How long a canonical task fetch may take before it is abandoned.
    pub refresh_timeout_ms: u64,
    /// Leave completed tasks out of dependency candidate lists.
    pub hide_completed_candidates: bool,
    /// Refetch canonical tasks after each confirmed write.
    pub refresh_on_confirm: bool,
}

impl BoardConfig {
    /// Default status write timeout in milliseconds.
    pub const DEFAULT_STATUS_UPDATE_TIMEOUT_MS: u64 = 15_000;

    /// Default canonical fetch timeout in milliseconds.
    pub const DEFAULT_REFRESH_TIMEOUT_MS: u64 = 15_000;

    /// Parses a configuration from JSON, defaulting absent fields.
    ///
    /// # Errors
    ///
    /// Returns the parser error for malformed input.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Returns the status write timeout.
    #[must_use]
    pub const fn status_update_timeout(&self) -> Duration {
        Duration::from_millis(self.status_update_timeout_ms)
    }

    /// Sets the status write timeout, saturating at `u64::MAX` milliseconds.
    #[must_use]
    pub fn with_status_update_timeout(mut self, timeout: Duration) -> Self {
        self.status_update_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Returns the canonical fetch timeout.
    #[must_use]
    pub const fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    /// Sets the canonical fetch timeout, saturating like
    /// [`Self::with_status_update_timeout`].
    #[must_use]
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets whether completed tasks are offered as dependency candidates.
    #[must_use]
    pub const fn with_hide_completed_candidates(mut self, hide: bool) -> Self {
        self.hide_completed_candidates = hide;
        self
    }

    /// Sets whether confirmed writes trigger a refetch.
    #[must_use]
    pub const fn with_refresh_on_confirm(mut self, refresh: bool) -> Self {
        self.refresh_on_confirm = refresh;
        self
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            status_update_timeout_ms: Self::DEFAULT_STATUS_UPDATE_TIMEOUT_MS,
            refresh_timeout_ms: Self::DEFAULT_REFRESH_TIMEOUT_MS,
            hide_completed_candidates: true,
            refresh_on_confirm: true,
        }
    }
}
