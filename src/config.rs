use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Top-level configuration for the binary.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub harvest: HarvestSettings,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = HarvestSettings::default();

        let browser = BrowserConfig {
            chrome_path: env::var("IMOB_CHROME_PATH").ok().map(PathBuf::from),
            headless: parse_bool("IMOB_HEADLESS", defaults.browser.headless)?,
            user_agent: env::var("IMOB_USER_AGENT")
                .unwrap_or_else(|_| defaults.browser.user_agent.clone()),
        };

        let harvest = HarvestSettings {
            browser,
            results_wait: secs("IMOB_RESULTS_WAIT_SECS", defaults.results_wait)?,
            detail_page_load: secs("IMOB_DETAIL_TIMEOUT_SECS", defaults.detail_page_load)?,
            detail_result_timeout: secs(
                "IMOB_DETAIL_RESULT_TIMEOUT_SECS",
                defaults.detail_result_timeout,
            )?,
            max_page_workers: workers("IMOB_PAGE_WORKERS", defaults.max_page_workers)?,
            max_detail_workers: workers("IMOB_DETAIL_WORKERS", defaults.max_detail_workers)?,
            ..defaults
        };

        let log_level = env::var("IMOB_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            harvest,
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// How each isolated browser session is launched.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub chrome_path: Option<PathBuf>,
    pub headless: bool,
    pub user_agent: String,
}

/// Randomized pause taken after a browser session is torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownRange {
    pub min: Duration,
    pub max: Duration,
}

impl CooldownRange {
    #[cfg(test)]
    pub const NONE: CooldownRange = CooldownRange::millis(0, 0);

    pub const fn millis(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }
}

/// Timeouts, throttles and pool ceilings for both phases.
#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub browser: BrowserConfig,
    /// Page-load timeout for search result pages.
    pub results_page_load: Duration,
    /// Wait for the results container on a search page.
    pub results_wait: Duration,
    /// Page-load timeout for detail pages.
    pub detail_page_load: Duration,
    /// Pause after navigation before the detail document is read.
    pub detail_settle: Duration,
    /// Longest one detail task may run before its link is left unavailable.
    pub detail_result_timeout: Duration,
    pub page_cooldown: CooldownRange,
    pub detail_cooldown: CooldownRange,
    pub max_page_workers: usize,
    pub max_detail_workers: usize,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            browser: BrowserConfig {
                chrome_path: None,
                headless: true,
                user_agent: DEFAULT_USER_AGENT.to_string(),
            },
            results_page_load: Duration::from_secs(30),
            results_wait: Duration::from_secs(10),
            detail_page_load: Duration::from_secs(15),
            detail_settle: Duration::from_millis(500),
            detail_result_timeout: Duration::from_secs(30),
            page_cooldown: CooldownRange::millis(500, 1500),
            detail_cooldown: CooldownRange::millis(200, 500),
            max_page_workers: 4,
            max_detail_workers: 4,
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    Invalid { var: &'static str, value: String },
    ZeroWorkers(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid { var, value } => {
                write!(f, "invalid value '{value}' for {var}")
            }
            ConfigError::ZeroWorkers(var) => write!(f, "{var} must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}

fn parse_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}

fn secs(var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    parse_var(var, default.as_secs()).map(Duration::from_secs)
}

fn workers(var: &'static str, default: usize) -> Result<usize, ConfigError> {
    let n = parse_var(var, default)?;
    if n == 0 {
        return Err(ConfigError::ZeroWorkers(var));
    }
    Ok(n)
}

fn parse_bool(var: &'static str, default: bool) -> Result<bool, ConfigError> {
    let Ok(value) = env::var(var) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { var, value }),
    }
}
