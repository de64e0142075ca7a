use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use gridscan_fetch::{FetchOptions, RateLimitConfig, RetryPolicy};
use gridscan_geo::{GeoPoint, RadiusQuery, TypeFilter};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::coordinator::RunOptions;
use crate::{Error, Result};

/// Config file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "gridscan.toml";

/// Prefix of environment overrides; nested keys use `__`, as in
/// `GRIDSCAN_APIFY__ACTOR`.
pub const ENV_PREFIX: &str = "GRIDSCAN_";

/// Every tunable of a run, merged from defaults, the config file, the
/// environment and the command line, in that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius_km: Option<f64>,
    pub max_cell_km: f64,
    /// 0 disables the check.
    pub cell_cap_km: f64,
    pub types: String,

    pub workers: usize,
    pub checkpoint: PathBuf,
    pub output: PathBuf,
    pub keep_checkpoint: bool,
    pub clip_to_radius: bool,

    pub page_timeout_secs: u64,
    pub per_cell_cap: usize,
    pub max_pages: u32,

    pub max_retries: u32,
    pub retry_base_delay_ms: u64,

    /// 0 disables rate limiting.
    pub requests_per_sec: f64,
    pub burst: u32,
    pub cooldown_factor: f64,
    pub cooldown_secs: u64,

    pub apify: ApifySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApifySettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    pub language: String,
}

impl Default for ApifySettings {
    fn default() -> Self {
        Self {
            base_url: None,
            actor: None,
            language: "en".to_string(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        let fetch = FetchOptions::default();
        let retry = RetryPolicy::default();
        let rate = RateLimitConfig::default();
        Self {
            latitude: None,
            longitude: None,
            radius_km: None,
            max_cell_km: 2.0,
            cell_cap_km: 5.0,
            types: "all".to_string(),
            workers: 4,
            checkpoint: PathBuf::from("gridscan.checkpoint.json"),
            output: PathBuf::from("gridscan.results.json"),
            keep_checkpoint: false,
            clip_to_radius: true,
            page_timeout_secs: fetch.page_timeout.as_secs(),
            per_cell_cap: fetch.per_cell_cap,
            max_pages: fetch.max_pages,
            max_retries: retry.max_retries,
            retry_base_delay_ms: retry.base_delay.as_millis() as u64,
            requests_per_sec: rate.refill_per_sec,
            burst: rate.capacity,
            cooldown_factor: rate.cooldown_factor,
            cooldown_secs: rate.cooldown.as_secs(),
            apify: ApifySettings::default(),
        }
    }
}

impl Settings {
    /// Merge all configuration layers for `cli`.
    ///
    /// # Errors
    ///
    /// [`Error::ConfigNotFound`] if an explicit `--config` file is missing,
    /// [`Error::Config`] if any layer has a value of the wrong type.
    pub fn load(cli: &Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) if !path.exists() => return Err(Error::ConfigNotFound(path.clone())),
            Some(path) => path.as_path(),
            None => Path::new(DEFAULT_CONFIG_FILE),
        };

        let settings = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Serialized::defaults(cli.overrides()))
            .extract()?;
        Ok(settings)
    }

    /// The query to run. Validated here so bad input fails before any I/O.
    pub fn query(&self) -> Result<RadiusQuery> {
        let latitude = self.latitude.ok_or(Error::MissingSetting("latitude", "LATITUDE"))?;
        let longitude = self.longitude.ok_or(Error::MissingSetting("longitude", "LONGITUDE"))?;
        let radius_km = self.radius_km.ok_or(Error::MissingSetting("radius_km", "RADIUS_KM"))?;
        let Ok(type_filter) = self.types.parse::<TypeFilter>();

        let query =
            RadiusQuery::new(GeoPoint::new(latitude, longitude)?, radius_km, self.max_cell_km).type_filter(type_filter);
        query.validate(self.cell_cap())?;
        Ok(query)
    }

    pub fn run_options(&self) -> RunOptions {
        let fetch = FetchOptions::default()
            .page_timeout(Duration::from_secs(self.page_timeout_secs))
            .per_cell_cap(self.per_cell_cap)
            .max_pages(self.max_pages);
        let retry = RetryPolicy::default()
            .max_retries(self.max_retries)
            .base_delay(Duration::from_millis(self.retry_base_delay_ms));
        let rate_limit = (self.requests_per_sec > 0.0).then(|| {
            RateLimitConfig::default()
                .capacity(self.burst)
                .refill_per_sec(self.requests_per_sec)
                .cooldown_factor(self.cooldown_factor)
                .cooldown(Duration::from_secs(self.cooldown_secs))
        });

        RunOptions::default()
            .workers(self.workers)
            .clip_to_radius(self.clip_to_radius)
            .cell_cap_km(self.cell_cap())
            .fetch(fetch)
            .retry(retry)
            .rate_limit(rate_limit)
    }

    fn cell_cap(&self) -> Option<f64> {
        (self.cell_cap_km > 0.0).then_some(self.cell_cap_km)
    }
}
