use std::env;

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};

use crate::format::DisplayZone;
use crate::normalize::{EmptyDataPolicy, UnknownChannelPolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deployment {
    Local,
    Dev,
    Stage,
    Prod,
}

impl Deployment {
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Self::Dev,
            "stage" | "staging" => Self::Stage,
            "prod" | "production" => Self::Prod,
            _ => Self::Local,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Backend API
    pub api_base_url: String,
    pub request_timeout_seconds: u64,

    // Polling
    pub poll_interval_seconds: u64,
    pub initial_window_minutes: i64,

    // Normalization
    pub empty_data_policy: EmptyDataPolicy,
    pub unknown_channel_policy: UnknownChannelPolicy,

    // Display
    pub display_zone: DisplayZone,

    // Application metadata
    pub deployment: Deployment,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if required environment variables are not set,
    /// and `ConfigError::Invalid` if a policy or offset value cannot be understood.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let display_zone = match env::var("DISPLAY_UTC_OFFSET_MINUTES") {
            Ok(raw) => parse_display_zone(&raw)?,
            Err(_) => DisplayZone::Local,
        };

        Ok(Self {
            // Backend API
            api_base_url: env::var("API_BASE_URL")
                .map_err(|_| ConfigError::Missing("API_BASE_URL"))?
                .trim_end_matches('/')
                .to_string(),
            request_timeout_seconds: env::var("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),

            // Polling
            poll_interval_seconds: env::var("POLL_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            initial_window_minutes: env::var("INITIAL_WINDOW_MINUTES")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),

            // Normalization
            empty_data_policy: EmptyDataPolicy::parse(
                &env::var("EMPTY_DATA_POLICY").unwrap_or_else(|_| "empty".to_string()),
            )
            .ok_or(ConfigError::Invalid("EMPTY_DATA_POLICY"))?,
            unknown_channel_policy: UnknownChannelPolicy::parse(
                &env::var("UNKNOWN_CHANNEL_POLICY").unwrap_or_else(|_| "pass_through".to_string()),
            )
            .ok_or(ConfigError::Invalid("UNKNOWN_CHANNEL_POLICY"))?,

            display_zone,

            // Application metadata
            deployment: Deployment::from_str(
                &env::var("DEPLOYMENT").unwrap_or_else(|_| "local".to_string()),
            ),
        })
    }
}

impl Config {
    /// Start of the first polling window, `initial_window_minutes` before `anchor`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the window cannot be represented.
    pub fn initial_window_start(&self, anchor: DateTime<Utc>) -> Result<DateTime<Utc>, ConfigError> {
        TimeDelta::try_minutes(self.initial_window_minutes)
            .and_then(|window| anchor.checked_sub_signed(window))
            .ok_or(ConfigError::Invalid("INITIAL_WINDOW_MINUTES"))
    }
}

fn parse_display_zone(raw: &str) -> Result<DisplayZone, ConfigError> {
    let minutes: i32 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid("DISPLAY_UTC_OFFSET_MINUTES"))?;
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .map(DisplayZone::Fixed)
        .ok_or(ConfigError::Invalid("DISPLAY_UTC_OFFSET_MINUTES"))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
