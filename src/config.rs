// Build-time node configuration. Every value can be overridden through the
// environment of the `cargo build` invocation (see build.rs).

use std::str::FromStr;
use std::time::Duration;

use crate::cycle::CyclePolicy;

const WIFI_SSID: &str = match option_env!("WIFI_SSID") {
    Some(v) => v,
    None => "ssid",
};
const WIFI_PASS: &str = match option_env!("WIFI_PASS") {
    Some(v) => v,
    None => "pass",
};
const COLLECTOR_HOST: &str = match option_env!("COLLECTOR_HOST") {
    Some(v) => v,
    None => "192.168.1.100",
};
const COLLECTOR_PORT_DEFAULT: u16 = 1234;
const COLLECTOR_PORT_ENV: Option<&str> = option_env!("COLLECTOR_PORT");

/// Same default as the collector, so an unconfigured pair still talks.
pub const DEFAULT_HMAC_KEY: &str = "change-me-in-menuconfig";
const HMAC_KEY: &str = match option_env!("GH_HMAC_KEY") {
    Some(v) => v,
    None => DEFAULT_HMAC_KEY,
};

const DEEP_SLEEP_SECS_DEFAULT: u64 = 1800;
const DEEP_SLEEP_SECS_ENV: Option<&str> = option_env!("DEEP_SLEEP_SECS");
// Sensor heater warm-up after power-on. Disabled by default.
const WARM_UP_SECS_DEFAULT: u64 = 0;
const WARM_UP_SECS_ENV: Option<&str> = option_env!("WARM_UP_SECS");
const NR_RETRIES_DEFAULT: u32 = 5;
const NR_RETRIES_ENV: Option<&str> = option_env!("NR_RETRIES");
const RETRY_DELAY_MS_DEFAULT: u64 = 2000;
const RETRY_DELAY_MS_ENV: Option<&str> = option_env!("RETRY_DELAY_MS");

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub wifi_ssid: &'static str,
    pub wifi_pass: &'static str,
    pub collector_host: &'static str,
    pub collector_port: u16,
    pub hmac_key: &'static [u8],
    pub deep_sleep: Duration,
    pub warm_up: Duration,
    pub wifi_timeout: Duration,
    pub sntp_timeout: Duration,
    pub connect_timeout: Duration,
    pub policy: CyclePolicy,
}

impl NodeConfig {
    pub fn from_env() -> Self {
        Self {
            wifi_ssid: WIFI_SSID,
            wifi_pass: WIFI_PASS,
            collector_host: COLLECTOR_HOST,
            collector_port: parse_or(COLLECTOR_PORT_ENV, COLLECTOR_PORT_DEFAULT),
            hmac_key: HMAC_KEY.as_bytes(),
            deep_sleep: Duration::from_secs(parse_or(DEEP_SLEEP_SECS_ENV, DEEP_SLEEP_SECS_DEFAULT)),
            warm_up: Duration::from_secs(parse_or(WARM_UP_SECS_ENV, WARM_UP_SECS_DEFAULT)),
            wifi_timeout: Duration::from_secs(30),
            sntp_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            policy: CyclePolicy {
                attempts: parse_or(NR_RETRIES_ENV, NR_RETRIES_DEFAULT).max(1),
                retry_delay: Duration::from_millis(parse_or(RETRY_DELAY_MS_ENV, RETRY_DELAY_MS_DEFAULT)),
            },
        }
    }

    pub fn uses_default_key(&self) -> bool {
        self.hmac_key == DEFAULT_HMAC_KEY.as_bytes()
    }
}

fn parse_or<T: FromStr>(value: Option<&str>, default: T) -> T {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_falls_back_on_missing_or_bad_values() {
        assert_eq!(parse_or::<u16>(None, 1234), 1234);
        assert_eq!(parse_or::<u16>(Some(""), 1234), 1234);
        assert_eq!(parse_or::<u16>(Some("70000"), 1234), 1234);
        assert_eq!(parse_or::<u16>(Some(" 4321 "), 1234), 4321);
    }

    #[test]
    fn config_is_usable() {
        let config = NodeConfig::from_env();
        assert!(!config.hmac_key.is_empty());
        assert!(config.policy.attempts >= 1);
    }
}
