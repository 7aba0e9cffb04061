use crate::config::{BrowserConfig, CooldownRange};
use crate::scraping::ScraperError;
use headless_chrome::{Browser, LaunchOptions, Tab};
use rand::Rng;
use std::ffi::OsStr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;

// Detail pages are single documents; everything not needed to read them is off.
const LIGHTWEIGHT_ARGS: [&str; 6] = [
    "--disable-dev-shm-usage",
    "--disable-blink-features=AutomationControlled",
    "--disable-extensions",
    "--disable-plugins",
    "--disable-infobars",
    "--blink-settings=imagesEnabled=false",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    ResultsPage,
    DetailPage,
}

/// What a fetcher asks of the session it is about to launch.
#[derive(Debug, Clone)]
pub struct SessionProfile {
    pub kind: SessionKind,
    pub page_load_timeout: Duration,
}

impl SessionProfile {
    pub fn results_page(page_load_timeout: Duration) -> Self {
        Self {
            kind: SessionKind::ResultsPage,
            page_load_timeout,
        }
    }

    pub fn detail_page(page_load_timeout: Duration) -> Self {
        Self {
            kind: SessionKind::DetailPage,
            page_load_timeout,
        }
    }
}

/// One isolated browser, owned by exactly one task. Dropping it tears the
/// browser down.
pub trait BrowserSession {
    fn open(&mut self, url: &str) -> Result<(), ScraperError>;
    fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), ScraperError>;
    fn html(&mut self) -> Result<String, ScraperError>;
}

pub trait BrowserLauncher: Send + Sync {
    fn launch(&self, profile: &SessionProfile) -> Result<Box<dyn BrowserSession>, ScraperError>;
}

/// Launches a fresh headless Chrome process per session.
pub struct ChromeLauncher {
    config: BrowserConfig,
}

impl ChromeLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

impl BrowserLauncher for ChromeLauncher {
    fn launch(&self, profile: &SessionProfile) -> Result<Box<dyn BrowserSession>, ScraperError> {
        let ua_arg = format!("--user-agent={}", self.config.user_agent);
        let mut args: Vec<&OsStr> = vec![OsStr::new("--disable-gpu"), OsStr::new(&ua_arg)];
        if profile.kind == SessionKind::DetailPage {
            args.extend(LIGHTWEIGHT_ARGS.iter().map(|arg| OsStr::new(*arg)));
        }

        let options = LaunchOptions {
            headless: self.config.headless,
            sandbox: false,
            window_size: Some((1920, 1200)),
            path: self.config.chrome_path.clone(),
            args,
            ..Default::default()
        };

        let browser = Browser::new(options).map_err(|e| ScraperError::Browser(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| ScraperError::Browser(format!("Failed to open tab: {e}")))?;
        tab.set_default_timeout(profile.page_load_timeout);

        Ok(Box::new(ChromeSession {
            tab,
            _browser: browser,
        }))
    }
}

// Field order matters: the tab is closed before the browser process is killed.
struct ChromeSession {
    tab: Arc<Tab>,
    _browser: Browser,
}

impl BrowserSession for ChromeSession {
    fn open(&mut self, url: &str) -> Result<(), ScraperError> {
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| ScraperError::Navigation(format!("{url}: {e}")))?;
        Ok(())
    }

    fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), ScraperError> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .map(|_| ())
            .map_err(|e| ScraperError::Timeout(format!("waiting for {selector}: {e}")))
    }

    fn html(&mut self) -> Result<String, ScraperError> {
        self.tab
            .get_content()
            .map_err(|e| ScraperError::Browser(format!("Failed to read document: {e}")))
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(false) {
            debug!("Tab close failed during teardown: {e}");
        }
    }
}

/// Sleeps a random interval from `range` when dropped. Created before the
/// session so the pause always follows teardown, whatever the exit path.
pub struct Cooldown {
    range: CooldownRange,
}

impl Cooldown {
    pub fn new(range: CooldownRange) -> Self {
        Self { range }
    }
}

impl Drop for Cooldown {
    fn drop(&mut self) {
        let pause = sample(self.range);
        if !pause.is_zero() {
            thread::sleep(pause);
        }
    }
}

fn sample(range: CooldownRange) -> Duration {
    let low = range.min.as_millis() as u64;
    let high = range.max.as_millis() as u64;
    if high <= low {
        return range.min;
    }
    Duration::from_millis(rand::thread_rng().gen_range(low..=high))
}
