use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use fortec_core::config::ImageConfig;

use crate::error::UpstreamError;
use crate::http::{build_headers, RetryingCaller};
use crate::provider::ImageProvider;

/// Body of an image generation request.
#[derive(Debug, Clone, Serialize)]
pub struct ImageRequest {
    pub prompt: String,
    pub n: u32,
    pub size: String,
    pub is_enhance: bool,
    pub response_format: &'static str,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>, config: &ImageConfig) -> Self {
        Self {
            prompt: prompt.into(),
            n: config.count.max(1),
            size: config.size.clone(),
            is_enhance: config.enhance,
            response_format: "url",
        }
    }
}

pub struct ImageClient {
    caller: RetryingCaller,
    config: ImageConfig,
    headers: HeaderMap,
}

impl ImageClient {
    pub fn new(config: &ImageConfig, caller: RetryingCaller) -> Self {
        Self {
            caller,
            headers: build_headers(config.api_key.as_deref(), &BTreeMap::new()),
            config: config.clone(),
        }
    }
}

#[async_trait]
impl ImageProvider for ImageClient {
    fn name(&self) -> &str {
        "image-generations"
    }

    async fn generate(&self, prompt: &str) -> Result<Vec<String>, UpstreamError> {
        let request = ImageRequest::new(prompt, &self.config);
        debug!(n = request.n, size = %request.size, "requesting image generation");

        let resp: ApiResponse = self
            .caller
            .post_json(
                &self.config.endpoint,
                &self.headers,
                &request,
                Duration::from_secs(self.config.timeout_secs),
            )
            .await?;

        let urls: Vec<String> = resp
            .data
            .into_iter()
            .filter_map(|d| d.url)
            .filter(|u| !u.is_empty())
            .collect();

        if urls.is_empty() {
            return Err(UpstreamError::Parse("response has no image urls".to_string()));
        }
        Ok(urls)
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
}
