use std::time::Duration;

/// Timing knobs for a [`Bridge`](crate::session::Bridge).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BridgeConfig {
    /// How long a detected move must stay put before it is sent.
    pub settle_delay: Duration,
    /// Minimum spacing between two LED commands.
    pub indicator_interval: Duration,
}

impl BridgeConfig {
    pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(250);
    pub const DEFAULT_INDICATOR_INTERVAL: Duration = Duration::from_millis(100);
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            settle_delay: Self::DEFAULT_SETTLE_DELAY,
            indicator_interval: Self::DEFAULT_INDICATOR_INTERVAL,
        }
    }
}
