//! Configuration management

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{self, Context, Result};

use crate::defaults::*;
use crate::services::geocoding::GeocoderBackend;
use crate::services::routing::RoutingBackend;
use crate::services::vrp::{SolverBackend, SolverConfig};

/// Log output format for stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}' (expected text or json)", other)),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,

    /// Origins allowed by CORS
    pub allowed_origins: Vec<String>,

    pub routing_backend: RoutingBackend,
    pub osrm_url: String,
    /// OSRM profile segment of the request path (driving, car, ...)
    pub osrm_profile: String,
    /// Valhalla routing engine URL, required for the valhalla backend
    pub valhalla_url: Option<String>,
    pub routing_timeout: Duration,
    pub routing_max_attempts: u32,

    pub geocoder_backend: GeocoderBackend,
    /// Nominatim API URL (for geocoding)
    pub nominatim_url: String,
    pub geocoding_timeout: Duration,
    pub geocoding_max_attempts: u32,
    /// Minimum spacing between two provider calls
    pub geocoding_rate_limit: Duration,
    pub geocoding_cache_size: usize,
    pub geocoding_cache_ttl_days: u64,

    pub solver_backend: SolverBackend,
    pub solver_time_limit_seconds: u32,
    pub solver_max_generations: usize,

    /// Fetch road geometry for the optimized route
    pub route_geometry: bool,

    pub logs_dir: String,
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup (environment, tests)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let allowed_origins = get("ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(|origin| origin.trim().trim_end_matches('/').to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let config = Self {
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse(&get, "PORT", DEFAULT_PORT)?,
            allowed_origins,

            routing_backend: parse(&get, "ROUTING_BACKEND", RoutingBackend::Osrm)?,
            osrm_url: get("OSRM_URL").unwrap_or_else(|| DEFAULT_OSRM_URL.to_string()),
            osrm_profile: get("OSRM_PROFILE").unwrap_or_else(|| DEFAULT_OSRM_PROFILE.to_string()),
            valhalla_url: get("VALHALLA_URL"),
            routing_timeout: Duration::from_secs(parse(
                &get,
                "ROUTING_TIMEOUT_SECS",
                DEFAULT_ROUTING_TIMEOUT_SECS,
            )?),
            routing_max_attempts: parse(&get, "ROUTING_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,

            geocoder_backend: parse(&get, "GEOCODER_BACKEND", GeocoderBackend::Nominatim)?,
            nominatim_url: get("NOMINATIM_URL").unwrap_or_else(|| DEFAULT_NOMINATIM_URL.to_string()),
            geocoding_timeout: Duration::from_secs(parse(
                &get,
                "GEOCODING_TIMEOUT_SECS",
                DEFAULT_GEOCODING_TIMEOUT_SECS,
            )?),
            geocoding_max_attempts: parse(&get, "GEOCODING_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
            geocoding_rate_limit: Duration::from_millis(parse(
                &get,
                "GEOCODING_RATE_LIMIT_MS",
                DEFAULT_GEOCODING_RATE_LIMIT_MS,
            )?),
            geocoding_cache_size: parse(&get, "GEOCODING_CACHE_SIZE", DEFAULT_GEOCODING_CACHE_SIZE)?,
            geocoding_cache_ttl_days: parse(&get, "GEOCODING_CACHE_TTL_DAYS", DEFAULT_GEOCODING_CACHE_TTL_DAYS)?,

            solver_backend: parse(&get, "SOLVER_BACKEND", SolverBackend::Metaheuristic)?,
            solver_time_limit_seconds: parse(
                &get,
                "SOLVER_TIME_LIMIT_SECONDS",
                DEFAULT_SOLVER_TIME_LIMIT_SECONDS,
            )?,
            solver_max_generations: parse(&get, "SOLVER_MAX_GENERATIONS", DEFAULT_SOLVER_MAX_GENERATIONS)?,

            route_geometry: parse_flag(&get, "ROUTE_GEOMETRY", true)?,

            logs_dir: get("LOGS_DIR").unwrap_or_else(|| DEFAULT_LOGS_DIR.to_string()),
            log_format: parse(&get, "LOG_FORMAT", LogFormat::Text)?,
        };

        if config.routing_backend == RoutingBackend::Valhalla && config.valhalla_url.is_none() {
            anyhow::bail!("VALHALLA_URL must be set when ROUTING_BACKEND=valhalla");
        }
        if config.routing_timeout.is_zero() || config.geocoding_timeout.is_zero() {
            anyhow::bail!("ROUTING_TIMEOUT_SECS and GEOCODING_TIMEOUT_SECS must be greater than 0");
        }

        Ok(config)
    }

    pub fn solver_config(&self) -> SolverConfig {
        SolverConfig::new(
            self.solver_backend,
            self.solver_time_limit_seconds,
            self.solver_max_generations,
        )
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("invalid {}='{}'", key, raw)),
    }
}

fn parse_flag(get: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> Result<bool> {
    match get(key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => anyhow::bail!("invalid {}='{}' (expected true or false)", key, v),
    }
}
