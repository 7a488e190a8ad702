mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::Result;

/// Fetches `url` with a GET request and returns the response body.
///
/// Non-2xx responses are errors; the status and body text end up in the
/// message so a misconfigured URL fails at the fetch, not as a confusing
/// parse error downstream.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(anyhow::anyhow!("GET {url} returned {status}: {body}"));
    }

    Ok(resp.bytes().await?.to_vec())
}
