use std::{path::PathBuf, time::Duration};

use clap::Parser;
use common::config::BridgeConfig;

/// Plays lichess games on a sensor chess board.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// Serial device of the board. Defaults to the first USB serial adapter found.
    #[arg(long, env = "ECHESS_SERIAL_PORT")]
    pub port: Option<String>,

    #[arg(long, default_value_t = 115_200)]
    pub baud_rate: u32,

    /// How long a move must stay on the board before it is played.
    #[arg(long, default_value_t = 250)]
    pub settle_ms: u64,

    /// Minimum spacing between two LED updates.
    #[arg(long, default_value_t = 100)]
    pub indicator_interval_ms: u64,

    /// Wait between two lookups while no game is running.
    #[arg(long, default_value_t = 5)]
    pub poll_interval_secs: u64,

    #[arg(long, default_value = "https://lichess.org/api")]
    pub api_base: String,

    /// Personal API token with the board:play scope.
    #[arg(long, env = "LICHESS_API_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Also write logs to <DIR>/<date>.log.
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

impl Cli {
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            settle_delay: Duration::from_millis(self.settle_ms),
            indicator_interval: Duration::from_millis(self.indicator_interval_ms),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_the_bridge_defaults() {
        let cli = Cli::try_parse_from(["echess-bridge", "--token", "lip_test"]).unwrap();
        assert_eq!(cli.bridge_config(), BridgeConfig::default());
        assert_eq!(cli.poll_interval(), Duration::from_secs(5));
        assert_eq!(cli.baud_rate, 115_200);
        assert_eq!(cli.api_base, "https://lichess.org/api");
        assert_eq!(cli.token, "lip_test");
    }

    #[test]
    fn timings_can_be_overridden() {
        let cli = Cli::try_parse_from([
            "echess-bridge",
            "--token",
            "lip_test",
            "--settle-ms",
            "400",
            "--indicator-interval-ms",
            "50",
            "--port",
            "/dev/ttyUSB0",
        ])
        .unwrap();
        assert_eq!(cli.bridge_config().settle_delay, Duration::from_millis(400));
        assert_eq!(
            cli.bridge_config().indicator_interval,
            Duration::from_millis(50)
        );
        assert_eq!(cli.port.as_deref(), Some("/dev/ttyUSB0"));
    }
}
