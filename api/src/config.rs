//! Server configuration from the environment.
//!
//! - `GOOGLE_GEMINI_API_KEY` (required)
//! - `GEMINI_MODEL`, `GEMINI_API_BASE`, `GEMINI_TIMEOUT_SECS`
//! - `PORT` (default 3000), `MAX_UPLOAD_BYTES` (default 200 MB)

use anyhow::{Context, Result};
use formcheck_core::GeminiConfig;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_PORT};

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini: GeminiConfig,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = var("GOOGLE_GEMINI_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .context("GOOGLE_GEMINI_API_KEY must be set")?;

        let mut gemini = GeminiConfig::new(api_key);
        if let Some(model) = var("GEMINI_MODEL") {
            gemini.model = model;
        }
        if let Some(base) = var("GEMINI_API_BASE") {
            gemini.api_base = base;
        }
        gemini.timeout = var("GEMINI_TIMEOUT_SECS")
            .map(|v| parse_var::<u64>("GEMINI_TIMEOUT_SECS", &v))
            .transpose()?
            .map(Duration::from_secs);

        let port = var("PORT")
            .map(|v| parse_var("PORT", &v))
            .transpose()?
            .unwrap_or(DEFAULT_PORT);
        let max_upload_bytes = var("MAX_UPLOAD_BYTES")
            .map(|v| parse_var("MAX_UPLOAD_BYTES", &v))
            .transpose()?
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        Ok(Self {
            gemini,
            port,
            max_upload_bytes,
        })
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("{name} has invalid value {value:?}: {e}"))
}
