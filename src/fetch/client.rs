use async_trait::async_trait;
use reqwest::{Request, Response};

/// Seam for HTTP execution so loaders can be driven by a stub in tests.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
