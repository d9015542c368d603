use std::time::Duration;

use anyhow::{Result, anyhow};
use reqwest::Client;

/// Timeout for token-backed manifest fetches.
pub const MANIFEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for fully-proxied sub-resource fetches, segments included.
pub const PROXY_TIMEOUT: Duration = Duration::from_secs(15);

/// Issue an authenticated GET against the upstream.
///
/// Non-2xx statuses are errors: a blocked or expired token must surface
/// as unavailable, never as stale content.
pub async fn get(
    client: &Client,
    url: &str,
    headers: &[(String, String)],
    timeout: Duration,
) -> Result<reqwest::Response> {
    let mut request = client.get(url).timeout(timeout);
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }

    let response = request
        .send()
        .await
        .map_err(|e| anyhow!("request failed for '{}': {}", url, e))?;

    if !response.status().is_success() {
        return Err(anyhow!("upstream {} for '{}'", response.status(), url));
    }

    Ok(response)
}

/// Fetch a manifest body as text.
pub async fn fetch_manifest(
    client: &Client,
    url: &str,
    headers: &[(String, String)],
    timeout: Duration,
) -> Result<String> {
    let response = get(client, url, headers, timeout).await?;
    response
        .text()
        .await
        .map_err(|e| anyhow!("failed to read manifest body from '{}': {}", url, e))
}
