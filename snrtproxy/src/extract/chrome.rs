use std::time::Duration;

use anyhow::{Result, anyhow};
use chrome_browser::{ChromeBrowser, ChromeBrowserTab, ChromeLaunchOptions, NetworkRequestStream};

use crate::util;

use super::capture::{CaptureSession, CapturedUrl};

/**
    Chrome-backed capture session.

    One browser per channel so sessions stay independent. The network
    request stream is subscribed at launch and drained during every wait
    window, so requests fired between windows are not lost.
*/
pub struct ChromeCapture {
    browser: ChromeBrowser,
    tab: ChromeBrowserTab,
    requests: NetworkRequestStream,
}

impl ChromeCapture {
    pub async fn launch(headless: bool) -> Result<Self> {
        let options = ChromeLaunchOptions::default()
            .headless(headless)
            .devtools(false)
            .enable_gpu(headless);

        let browser = ChromeBrowser::new(options).await?;
        let tab = browser
            .get_tab(0)
            .await
            .ok_or_else(|| anyhow!("No browser tab available"))?;
        let requests = tab.network().requests();

        Ok(Self {
            browser,
            tab,
            requests,
        })
    }
}

impl CaptureSession for ChromeCapture {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        // Tolerate a slow page; requests keep flowing while it loads.
        let _ = tokio::time::timeout(timeout, self.tab.navigate(url)).await;
        Ok(())
    }

    async fn wait(&mut self, duration: Duration) -> Vec<CapturedUrl> {
        let deadline = tokio::time::Instant::now() + duration;
        let mut captured = Vec::new();

        loop {
            match tokio::time::timeout_at(deadline, self.requests.next()).await {
                Ok(Some(request)) => captured.push(CapturedUrl {
                    url: request.url().to_string(),
                    captured_at: util::time::now(),
                }),
                Ok(None) => break,
                Err(_) => break,
            }
        }

        captured
    }

    async fn try_click(&mut self, selectors: &[&str]) -> bool {
        for selector in selectors {
            let found =
                tokio::time::timeout(Duration::from_secs(3), self.tab.wait_for_selector(selector))
                    .await;
            if let Ok(Ok(element)) = found
                && element.click().await.is_ok()
            {
                return true;
            }
        }
        false
    }

    async fn close(self) -> Result<()> {
        let _ = self.tab.navigate("about:blank").await;
        let _ = self.browser.close().await;
        Ok(())
    }
}
