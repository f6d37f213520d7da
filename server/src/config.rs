use crate::error::ServerError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime settings for the replication server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the UDP socket binds to
    pub bind_addr: String,
    /// Simulation and replication cycles per second
    pub tick_rate: u32,
    /// Maximum number of concurrent connections
    pub max_clients: usize,
    /// Silence after which a connection is dropped
    pub client_timeout: Duration,
    /// How often the timeout checker scans the roster
    pub timeout_check_interval: Duration,
    /// Seed for the demo world, random if absent
    pub world_seed: Option<u64>,
    /// Chance per tick that one map tile changes
    pub tile_churn: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            tick_rate: 30,
            max_clients: 32,
            client_timeout: Duration::from_secs(5),
            timeout_check_interval: Duration::from_secs(1),
            world_seed: None,
            tile_churn: 0.1,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.tick_rate == 0 {
            return Err(ServerError::InvalidConfig(
                "tick rate must be at least 1Hz".to_string(),
            ));
        }
        if self.max_clients == 0 {
            return Err(ServerError::InvalidConfig(
                "max clients must be at least 1".to_string(),
            ));
        }
        if self.client_timeout.is_zero() || self.timeout_check_interval.is_zero() {
            return Err(ServerError::InvalidConfig(
                "timeouts must be non-zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.tile_churn) {
            return Err(ServerError::InvalidConfig(format!(
                "tile churn {} is not a probability",
                self.tile_churn
            )));
        }
        Ok(())
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}
