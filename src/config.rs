//! Engine configuration, loaded from environment variables.

use std::str::FromStr;

use thiserror::Error;

/// How initiation holds inventory until the gateway calls back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReservationPolicy {
    /// Capacity is checked at initiation but only consumed on confirmation.
    /// Concurrent initiations may both pass; the later settlement then fails
    /// with an oversell.
    #[default]
    Soft,
    /// Initiation holds the shares on the project until the payment settles
    /// or fails.
    Hard,
}

impl FromStr for ReservationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "soft" => Ok(ReservationPolicy::Soft),
            "hard" => Ok(ReservationPolicy::Hard),
            other => Err(format!("expected 'soft' or 'hard', got '{other}'")),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key}='{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub reservation: ReservationPolicy,
    /// Longest accepted idempotency key, in characters.
    pub max_key_len: usize,
    /// Buffer between the command reader and the engine.
    pub channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reservation: ReservationPolicy::Soft,
            max_key_len: 255,
            channel_capacity: 16,
        }
    }
}

impl Config {
    pub const RESERVATION: &'static str = "CROWDFUND_RESERVATION";
    pub const MAX_KEY_LEN: &'static str = "CROWDFUND_MAX_KEY_LEN";
    pub const CHANNEL_CAPACITY: &'static str = "CROWDFUND_CHANNEL_CAPACITY";

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from `lookup`, falling back to defaults for unset keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            reservation: parse(&lookup, Self::RESERVATION, defaults.reservation)?,
            max_key_len: positive(
                parse(&lookup, Self::MAX_KEY_LEN, defaults.max_key_len)?,
                Self::MAX_KEY_LEN,
            )?,
            channel_capacity: positive(
                parse(&lookup, Self::CHANNEL_CAPACITY, defaults.channel_capacity)?,
                Self::CHANNEL_CAPACITY,
            )?,
        })
    }

    pub fn with_reservation(mut self, reservation: ReservationPolicy) -> Self {
        self.reservation = reservation;
        self
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

fn positive(value: usize, key: &'static str) -> Result<usize, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(value)
}
