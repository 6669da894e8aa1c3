//! Configuration parsing and validation for the recipe gateway
//!
//! This module handles command-line argument parsing and validation using clap. Every option can
//! also be set through the environment. The upstream API key itself is not part of the
//! configuration: only the name of the variable holding it is, and it is read per request.
use anyhow::anyhow;
use clap::{ArgAction, Parser};
use diabetic_chef::client::PoolConfig;
use diabetic_chef::upstream::UpstreamConfig;
use std::ops::RangeInclusive;
use std::time::Duration;
use url::Url;

const TEMPERATURE_RANGE: RangeInclusive<f64> = 0.5..=0.7;
const TIMEOUT_RANGE_SECS: RangeInclusive<u64> = 15..=20;

#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// The port on which the recipe server will listen.
    #[arg(short = 'p', long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// The port on which the metrics server will listen.
    #[arg(long, env = "CHEF_METRICS_PORT", default_value_t = 9090)]
    pub metrics_port: u16,

    /// Whether to enable the metrics endpoint.
    #[arg(short = 'm', long, env = "CHEF_METRICS", default_value_t = true, action = ArgAction::Set)]
    pub metrics: bool,

    /// The prefix to use for metrics.
    #[arg(long, env = "CHEF_METRICS_PREFIX", default_value = "diabetic_chef")]
    pub metrics_prefix: String,

    /// Chat-completion endpoint of the model provider.
    #[arg(
        long,
        env = "CHEF_UPSTREAM_URL",
        default_value = "https://api.openai.com/v1/chat/completions"
    )]
    pub upstream_url: Url,

    /// Model identifier sent with every completion request.
    #[arg(long, env = "CHEF_MODEL", default_value = "gpt-3.5-turbo")]
    pub model: String,

    /// Sampling temperature, between 0.5 and 0.7.
    #[arg(long, env = "CHEF_TEMPERATURE", default_value_t = 0.7)]
    pub temperature: f64,

    /// Hard deadline (in seconds) for the upstream call, between 15 and 20.
    #[arg(long, env = "CHEF_UPSTREAM_TIMEOUT_SECS", default_value_t = 20)]
    pub timeout_secs: u64,

    /// Name of the environment variable holding the provider's API key.
    #[arg(long, env = "CHEF_API_KEY_ENV", default_value = "OPENAI_API_KEY")]
    pub api_key_env: String,

    /// Maximum number of idle HTTP connections to keep alive per upstream host.
    #[arg(long, default_value_t = 100)]
    pub pool_max_idle_per_host: usize,

    /// How long (in seconds) to keep idle HTTP connections alive.
    #[arg(long, default_value_t = 90)]
    pub pool_idle_timeout_secs: u64,
}

impl Config {
    pub fn validate(self) -> Result<Self, anyhow::Error> {
        if !TEMPERATURE_RANGE.contains(&self.temperature) {
            return Err(anyhow!(
                "Temperature {} is outside the allowed range {:?}",
                self.temperature,
                TEMPERATURE_RANGE
            ));
        }
        if !TIMEOUT_RANGE_SECS.contains(&self.timeout_secs) {
            return Err(anyhow!(
                "Upstream timeout of {}s is outside the allowed range {:?}",
                self.timeout_secs,
                TIMEOUT_RANGE_SECS
            ));
        }
        if self.api_key_env.trim().is_empty() {
            return Err(anyhow!("API key environment variable name must not be empty"));
        }
        Ok(self)
    }

    pub fn upstream(&self) -> UpstreamConfig {
        UpstreamConfig::builder()
            .endpoint(self.upstream_url.clone())
            .model(self.model.clone())
            .temperature(self.temperature)
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
    }

    pub fn pool(&self) -> PoolConfig {
        PoolConfig {
            idle_timeout: Duration::from_secs(self.pool_idle_timeout_secs),
            max_idle_per_host: self.pool_max_idle_per_host,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("diabetic-chef").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = parse(&[]).validate().unwrap();
        let upstream = config.upstream();
        assert_eq!(
            upstream.endpoint.as_str(),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(upstream.model, "gpt-3.5-turbo");
        assert_eq!(upstream.temperature, 0.7);
        assert_eq!(upstream.timeout, Duration::from_secs(20));
        assert_eq!(config.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.pool().idle_timeout, Duration::from_secs(90));
    }

    #[rstest]
    #[case(&["--temperature", "0.9"])]
    #[case(&["--temperature", "0.2"])]
    #[case(&["--timeout-secs", "5"])]
    #[case(&["--timeout-secs", "60"])]
    #[case(&["--api-key-env", " "])]
    fn test_out_of_range_values_are_rejected(#[case] args: &[&str]) {
        assert!(parse(args).validate().is_err());
    }

    #[test]
    fn test_metrics_can_be_disabled() {
        assert!(!parse(&["--metrics", "false"]).metrics);
    }
}
