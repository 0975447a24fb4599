use std::path::{Path, PathBuf};

use crate::{
    channel::DEFAULT_CAPACITY,
    error::{Error, Result},
};

pub const STORAGE_DIR_ENV: &str = "ARCHDEX_STORAGE_DIR";
/// Variable name used by earlier deployments.
pub const LEGACY_STORAGE_DIR_ENV: &str = "STORAGE_DIR";
pub const POLL_INTERVAL_ENV: &str = "ARCHDEX_POLL_INTERVAL";
pub const INCLUDE_HIDDEN_ENV: &str = "ARCHDEX_INCLUDE_HIDDEN";
pub const CHANNEL_CAPACITY_ENV: &str = "ARCHDEX_CHANNEL_CAPACITY";

pub const DEFAULT_POLL_INTERVAL: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub storage_dir: PathBuf,
    /// Seconds between detector polls.
    pub poll_interval: f64,
    pub include_hidden: bool,
    pub channel_capacity: usize,
}

impl Settings {
    /// Resolve settings from, in order of priority:
    /// 1. An explicit storage root (from --root)
    /// 2. Process environment variables
    /// 3. A `.env` file in the working directory
    ///
    /// The storage root is not checked for existence here.
    pub fn resolve(explicit_root: Option<&Path>) -> Result<Self> {
        if let Err(e) = dotenvy::dotenv()
            && !e.not_found()
        {
            tracing::warn!("ignoring unreadable .env file: {e}");
        }
        Self::from_lookup(explicit_root, |key| std::env::var(key).ok())
    }

    /// Resolve settings against an arbitrary variable source.
    pub fn from_lookup(
        explicit_root: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let storage_dir = if let Some(path) = explicit_root {
            path.to_path_buf()
        } else if let Some(val) = lookup(STORAGE_DIR_ENV)
            .or_else(|| lookup(LEGACY_STORAGE_DIR_ENV))
            .filter(|v| !v.trim().is_empty())
        {
            PathBuf::from(val)
        } else {
            return Err(Error::Config(format!(
                "no storage root: pass --root or set {STORAGE_DIR_ENV}"
            )));
        };

        let poll_interval = match lookup(POLL_INTERVAL_ENV) {
            Some(raw) => raw.trim().parse::<f64>().map_err(|_| {
                Error::Config(format!(
                    "{POLL_INTERVAL_ENV} is not a number: {raw}"
                ))
            })?,
            None => DEFAULT_POLL_INTERVAL,
        };

        let include_hidden = lookup(INCLUDE_HIDDEN_ENV)
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let channel_capacity = match lookup(CHANNEL_CAPACITY_ENV) {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                Error::Config(format!(
                    "{CHANNEL_CAPACITY_ENV} is not a positive integer: {raw}"
                ))
            })?,
            None => DEFAULT_CAPACITY,
        };

        Ok(Self {
            storage_dir,
            poll_interval: sanitize_interval(poll_interval),
            include_hidden,
            channel_capacity: channel_capacity.max(1),
        })
    }

    /// Override the poll interval, clamping negatives and NaN to zero.
    pub fn with_poll_interval(mut self, secs: Option<f64>) -> Self {
        if let Some(secs) = secs {
            self.poll_interval = sanitize_interval(secs);
        }
        self
    }
}

fn sanitize_interval(secs: f64) -> f64 {
    if secs.is_nan() || secs < 0.0 { 0.0 } else { secs }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
