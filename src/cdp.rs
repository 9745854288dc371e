//! Chrome DevTools Protocol renderer (uses the `headless_chrome` crate)
//!
//! One Chrome process is shared by every request. It is launched on first use
//! (or eagerly via [`SharedBrowser::warm_up`]) behind an async mutex, so two
//! requests racing on a cold start still launch a single browser. Each slide
//! gets its own tab, closed by [`TabGuard`] on every exit path. The tab is
//! sized with device metrics, opened on `about:blank`, and the slide HTML is
//! written into that document.

use crate::render::SnapshotRenderer;
use crate::{Error, RenderConfig, Result};
use async_trait::async_trait;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::{Emulation, Page};
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, info, warn};
use std::ffi::OsStr;
use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const CHROME_ARGS: &[&str] = &[
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--force-device-scale-factor=1",
    "--hide-scrollbars",
];

// headless_chrome kills a browser that sees no events for this long.
const BROWSER_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24 * 365);

// Headroom on top of the page budgets for CDP round trips.
const RENDER_SLACK_MS: u64 = 5000;

const NETWORK_IDLE_QUIET_MS: u64 = 500;

const NETWORK_IDLE_SCRIPT: &str = r#"(async function(limitMs, quietMs){
    const started = performance.now();
    let seen = -1;
    let quietSince = performance.now();
    while (performance.now() - started < limitMs) {
        const finished = performance.getEntriesByType('resource').length;
        const imagesDone = Array.from(document.images).every(function(img){ return img.complete; });
        if (finished !== seen || !imagesDone) {
            seen = finished;
            quietSince = performance.now();
        } else if (document.readyState === 'complete' && performance.now() - quietSince >= quietMs) {
            return true;
        }
        await new Promise(function(r){ setTimeout(r, 50); });
    }
    return false;
})({{LIMIT_MS}}, {{QUIET_MS}})"#;

const WRITE_DOCUMENT_SCRIPT: &str = r#"(function(html){
    document.open();
    document.write(html);
    document.close();
    return true;
})({{HTML}})"#;

const FONTS_READY_SCRIPT: &str = r#"Promise.race([
    document.fonts.ready.then(function(){ return true; }),
    new Promise(function(r){ setTimeout(function(){ r(false); }, {{FONT_WAIT_MS}}); })
])"#;

/// Process-wide, lazily launched Chrome instance.
pub struct SharedBrowser {
    config: RenderConfig,
    browser: Mutex<Option<Browser>>,
}

impl SharedBrowser {
    pub fn new(config: RenderConfig) -> Self {
        Self { config, browser: Mutex::new(None) }
    }

    /// Handle to the running browser, launching it if this is the first use.
    pub async fn handle(&self) -> Result<Browser> {
        let mut slot = self.browser.lock().await;
        if let Some(browser) = slot.as_ref() {
            return Ok(browser.clone());
        }

        let config = self.config.clone();
        let browser = tokio::task::spawn_blocking(move || launch(&config))
            .await
            .map_err(|e| Error::InitializationError(format!("Launch task failed: {}", e)))??;

        info!("[Browser] Chrome launched");
        *slot = Some(browser.clone());
        Ok(browser)
    }

    /// Launch the browser now instead of on the first request.
    pub async fn warm_up(&self) -> Result<()> {
        self.handle().await.map(|_| ())
    }

    /// Forget the current browser so the next request relaunches it.
    pub async fn invalidate(&self) {
        if let Some(browser) = self.browser.lock().await.take() {
            warn!("[Browser] Discarding unresponsive browser");
            drop_browser(browser).await;
        }
    }

    /// Close the browser process, if one was launched.
    pub async fn shutdown(&self) {
        if let Some(browser) = self.browser.lock().await.take() {
            info!("[Browser] Closing Chrome");
            drop_browser(browser).await;
        }
    }
}

fn launch(config: &RenderConfig) -> Result<Browser> {
    let options = LaunchOptions::default_builder()
        .headless(true)
        .sandbox(false)
        .window_size(Some((config.viewport.width, config.viewport.height)))
        .path(config.chrome_path.clone())
        .args(CHROME_ARGS.iter().map(OsStr::new).collect())
        .idle_browser_timeout(BROWSER_IDLE_TIMEOUT)
        .build()
        .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

    Browser::new(options).map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))
}

// Dropping the last handle kills the child process, which blocks briefly.
async fn drop_browser(browser: Browser) {
    if let Err(e) = tokio::task::spawn_blocking(move || drop(browser)).await {
        warn!("[Browser] Shutdown task failed: {}", e);
    }
}

/// A tab that is closed when the guard goes out of scope.
pub struct TabGuard {
    tab: Arc<Tab>,
}

impl TabGuard {
    pub fn open(browser: &Browser) -> Result<Self> {
        let tab = browser
            .new_tab()
            .map_err(|e| Error::TabUnavailable(e.to_string()))?;
        Ok(Self { tab })
    }
}

impl Deref for TabGuard {
    type Target = Tab;

    fn deref(&self) -> &Tab {
        &self.tab
    }
}

impl Drop for TabGuard {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(false) {
            debug!("[Render] Failed to close tab: {}", e);
        }
    }
}

/// [`SnapshotRenderer`] backed by the shared Chrome instance.
pub struct CdpRenderer {
    browser: Arc<SharedBrowser>,
    config: RenderConfig,
}

impl CdpRenderer {
    pub fn new(browser: Arc<SharedBrowser>, config: RenderConfig) -> Self {
        Self { browser, config }
    }
}

#[async_trait]
impl SnapshotRenderer for CdpRenderer {
    async fn render_png(&self, html: &str) -> Result<Vec<u8>> {
        let browser = self.browser.handle().await?;
        let config = self.config.clone();
        let html = html.to_string();
        let budget = Duration::from_millis(config.timeout_ms + config.font_wait_ms + RENDER_SLACK_MS);

        // A timed-out task keeps running until CDP gives up; its TabGuard still closes the tab.
        let task = tokio::task::spawn_blocking(move || capture(&browser, &config, &html));
        let result = match tokio::time::timeout(budget, task).await {
            Ok(joined) => joined.map_err(|e| Error::RenderError(format!("Render task failed: {}", e)))?,
            Err(_) => Err(Error::RenderTimeout(self.config.timeout_ms)),
        };

        if let Err(Error::TabUnavailable(_)) = &result {
            self.browser.invalidate().await;
        }
        result
    }
}

fn capture(browser: &Browser, config: &RenderConfig, html: &str) -> Result<Vec<u8>> {
    let started = Instant::now();
    let tab = TabGuard::open(browser)?;
    tab.set_default_timeout(Duration::from_millis(config.timeout_ms + RENDER_SLACK_MS));

    tab.call_method(Emulation::SetDeviceMetricsOverride {
        width: config.viewport.width,
        height: config.viewport.height,
        device_scale_factor: 1.0,
        mobile: false,
        scale: None,
        screen_width: None,
        screen_height: None,
        position_x: None,
        position_y: None,
        dont_set_visible_size: None,
        screen_orientation: None,
        viewport: None,
        display_feature: None,
        device_posture: None,
    })
    .map_err(|e| Error::RenderError(format!("Failed to set viewport: {}", e)))?;

    tab.navigate_to("about:blank")
        .and_then(|t| t.wait_until_navigated())
        .map_err(|e| navigation_error(e, config.timeout_ms))?;

    // Written into the live document; URLs (data: included) are capped at 2 MiB.
    if !evaluate_bool(&tab, &write_document_script(html)?)? {
        return Err(Error::RenderError("Failed to write slide document".into()));
    }

    let elapsed = started.elapsed().as_millis() as u64;
    let remaining = config.timeout_ms.saturating_sub(elapsed);
    let idle = NETWORK_IDLE_SCRIPT
        .replace("{{LIMIT_MS}}", &remaining.to_string())
        .replace("{{QUIET_MS}}", &NETWORK_IDLE_QUIET_MS.to_string());
    if !evaluate_bool(&tab, &idle)? {
        return Err(Error::RenderTimeout(config.timeout_ms));
    }

    let fonts = FONTS_READY_SCRIPT.replace("{{FONT_WAIT_MS}}", &config.font_wait_ms.to_string());
    if !evaluate_bool(&tab, &fonts)? {
        warn!("[Render] Fonts not ready after {}ms, capturing anyway", config.font_wait_ms);
    }

    let clip = Page::Viewport {
        x: 0.0,
        y: 0.0,
        width: f64::from(config.viewport.width),
        height: f64::from(config.viewport.height),
        scale: 1.0,
    };
    let png = tab
        .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, Some(clip), true)
        .map_err(|e| Error::RenderError(format!("Screenshot failed: {}", e)))?;

    debug!("[Render] Captured {} bytes in {}ms", png.len(), started.elapsed().as_millis());
    Ok(png)
}

fn write_document_script(html: &str) -> Result<String> {
    let literal = serde_json::to_string(html)
        .map_err(|e| Error::RenderError(format!("Failed to encode slide document: {}", e)))?;
    Ok(WRITE_DOCUMENT_SCRIPT.replace("{{HTML}}", &literal))
}

fn evaluate_bool(tab: &Tab, script: &str) -> Result<bool> {
    let result = tab
        .evaluate(script, true)
        .map_err(|e| Error::RenderError(format!("Evaluation failed: {}", e)))?;
    Ok(result.value.and_then(|v| v.as_bool()).unwrap_or(false))
}

fn navigation_error(err: anyhow::Error, timeout_ms: u64) -> Error {
    if err.downcast_ref::<headless_chrome::util::Timeout>().is_some() {
        Error::RenderTimeout(timeout_ms)
    } else {
        Error::RenderError(format!("Navigation failed: {}", err))
    }
}
