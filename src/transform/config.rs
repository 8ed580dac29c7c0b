/// Fixed content length used by the completion-rate derivation.
pub const ASSUMED_SHOW_LENGTH_MINUTES: f64 = 60.0;

/// A user is a binge watcher when their binge ratio is strictly above this.
pub const BINGE_WATCHER_RATIO: f64 = 0.5;

/// Configuration for the transform pipeline with tunable thresholds.
#[derive(Debug, Clone)]
pub struct TransformConfig {
    /// A session at or above this many minutes is a binge session
    pub binge_threshold_minutes: f64,

    /// Carried for downstream validation; none of the metric formulas read it
    pub completion_rate_threshold: f64,

    /// Clamp completion_rate to [0, 1] after scoring
    pub clamp_completion_rate: bool,

    /// Engagement score weights
    pub weight_watch_time: f64,
    pub weight_binge_ratio: f64,
    pub weight_completion: f64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            binge_threshold_minutes: 120.0,
            completion_rate_threshold: 0.8,
            clamp_completion_rate: false,
            weight_watch_time: 0.40,
            weight_binge_ratio: 0.30,
            weight_completion: 0.30,
        }
    }
}
