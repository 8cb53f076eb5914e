use std::time::Duration;

use gcs_types::saturating_duration;
use serde::{Deserialize, Serialize};

use crate::server::DEFAULT_PORT;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CockpitConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-client sink depth; a slow client drops updates beyond this.
    #[serde(default = "default_sink_capacity")]
    pub sink_capacity: usize,
    /// Idle seconds before a client is sent a fresh snapshot unprompted.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: f64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_sink_capacity() -> usize {
    20
}

fn default_keepalive_secs() -> f64 {
    5.0
}

impl Default for CockpitConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            sink_capacity: default_sink_capacity(),
            keepalive_secs: default_keepalive_secs(),
        }
    }
}

impl CockpitConfig {
    /// Keepalive window, falling back to the default for unusable values.
    pub fn keepalive(&self) -> Duration {
        if self.keepalive_secs.is_finite() && self.keepalive_secs > 0.0 {
            saturating_duration(self.keepalive_secs)
        } else {
            saturating_duration(default_keepalive_secs())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = CockpitConfig::default();
        assert_eq!(c.port, 8080);
        assert_eq!(c.sink_capacity, 20);
        assert_eq!(c.keepalive(), Duration::from_secs(5));
    }

    #[test]
    fn bad_keepalive_falls_back() {
        let c = CockpitConfig {
            keepalive_secs: -1.0,
            ..Default::default()
        };
        assert_eq!(c.keepalive(), Duration::from_secs(5));
    }

    #[test]
    fn huge_keepalive_saturates() {
        let c = CockpitConfig {
            keepalive_secs: 1e300,
            ..Default::default()
        };
        assert_eq!(c.keepalive(), Duration::MAX);
    }
}
