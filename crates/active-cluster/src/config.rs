use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Construction-time configuration of the resolver.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Period between change-notification fan-outs to registered shards.
    /// Provider events arriving within one period coalesce into a single
    /// notification.
    #[serde(default = "default_notification_period", with = "humantime_serde")]
    pub notification_period: Duration,
    /// Number of workflow execution shards. Must agree with every other
    /// service of the deployment, or shards will disagree on which
    /// execution manager owns a workflow.
    #[serde(default = "default_num_shards")]
    pub num_shards: u32,
}

fn default_notification_period() -> Duration {
    Duration::from_secs(5)
}

fn default_num_shards() -> u32 {
    1024
}

impl Default for Config {
    fn default() -> Self {
        Self {
            notification_period: default_notification_period(),
            num_shards: default_num_shards(),
        }
    }
}

impl Config {
    pub(crate) fn validate(&self) -> crate::Result<()> {
        if self.num_shards == 0 {
            return Err(crate::Error::Config("numShards must be positive".to_string()));
        }
        if self.notification_period.is_zero() {
            return Err(crate::Error::Config(
                "notificationPeriod must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_and_parsing() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.notification_period, Duration::from_secs(5));
        assert_eq!(config.num_shards, 1024);
        config.validate().unwrap();

        let config: Config = serde_json::from_value(serde_json::json!({
            "notificationPeriod": "250ms",
            "numShards": 4,
        }))
        .unwrap();
        assert_eq!(config.notification_period, Duration::from_millis(250));
        assert_eq!(config.num_shards, 4);

        let config = Config {
            num_shards: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
