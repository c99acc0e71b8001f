//! Validator configuration

/// Configuration for a [`Validator`](super::Validator).
///
/// # Example
///
/// ```
/// use fieldcheck_lib::validator::ValidatorConfig;
///
/// let config = ValidatorConfig::default().with_name("signup-form");
/// assert!(config.reuse_results);
///
/// let uncached = ValidatorConfig::no_reuse();
/// assert!(!uncached.reuse_results);
/// ```
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Label used in log lines.
    ///
    /// Default: `"validator"`
    pub name: String,

    /// Reuse the last result when a request validates the same accumulated
    /// change that produced it.
    ///
    /// Default: `true`
    pub reuse_results: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            name: "validator".to_string(),
            reuse_results: true,
        }
    }
}

impl ValidatorConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the log label.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Enables or disables result reuse.
    pub fn with_reuse_results(mut self, enabled: bool) -> Self {
        self.reuse_results = enabled;
        self
    }

    /// Creates a config that re-runs the rules on every request.
    pub fn no_reuse() -> Self {
        Self {
            reuse_results: false,
            ..Default::default()
        }
    }
}
