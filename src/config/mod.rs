use std::env;
use std::time::Duration;

pub struct Config {
    pub transport: TransportConfig,
    pub presence: PresenceConfig,
}

pub struct TransportConfig {
    pub url: String,
    pub token: String,
}

pub struct PresenceConfig {
    pub heartbeat_interval: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            transport: TransportConfig {
                url: env::var("TRANSPORT_URL")
                    .unwrap_or_else(|_| "ws://localhost:7880".to_string()),
                token: env::var("TRANSPORT_TOKEN").unwrap_or_default(),
            },
            presence: PresenceConfig {
                heartbeat_interval: Duration::from_secs(
                    env::var("HEARTBEAT_INTERVAL_SECS")
                        .unwrap_or_else(|_| "30".to_string())
                        .parse()
                        .unwrap_or(30),
                ),
            },
        }
    }
}
