//! Gemini transport trait and reqwest-based HTTP implementation.

use std::pin::Pin;

use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::{Client, Response, StatusCode};

use crate::{ModelInfo, ProviderError, ProviderFuture};

use super::serde_api::{GeminiApiModelList, GeminiApiResponse, build_api_request, extract_error_message};
use super::types::{GeminiRequest, GeminiResponse, GeminiStreamChunk};

pub type GeminiChunkStream<'a> =
    Pin<Box<dyn Stream<Item = Result<GeminiStreamChunk, ProviderError>> + Send + 'a>>;

pub trait GeminiTransport: Send + Sync {
    fn generate<'a>(
        &'a self,
        request: GeminiRequest,
        api_key: String,
    ) -> ProviderFuture<'a, Result<GeminiResponse, ProviderError>>;

    fn stream_generate<'a>(
        &'a self,
        request: GeminiRequest,
        api_key: String,
    ) -> ProviderFuture<'a, Result<GeminiChunkStream<'a>, ProviderError>>;

    fn list_models<'a>(
        &'a self,
        api_key: String,
    ) -> ProviderFuture<'a, Result<Vec<ModelInfo>, ProviderError>>;
}

#[derive(Debug, Clone)]
pub struct GeminiHttpTransport {
    client: Client,
    base_url: String,
}

impl GeminiHttpTransport {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn map_send_error(err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::timeout(err.to_string())
        } else {
            ProviderError::transport(err.to_string())
        }
    }

    async fn parse_error(response: Response) -> ProviderError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body)
            .unwrap_or_else(|| format!("Gemini request failed with status {status}"));

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ProviderError::authentication(message)
            }
            StatusCode::TOO_MANY_REQUESTS => ProviderError::rate_limited(message),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                ProviderError::timeout(message)
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                // The backend reports revoked keys as a 400 with an
                // API_KEY_INVALID detail, not as a 401.
                if message.contains("API key") {
                    ProviderError::authentication(message)
                } else {
                    ProviderError::invalid_request(message)
                }
            }
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                ProviderError::unavailable(message)
            }
            _ => ProviderError::transport(message),
        }
    }
}

impl GeminiTransport for GeminiHttpTransport {
    fn generate<'a>(
        &'a self,
        request: GeminiRequest,
        api_key: String,
    ) -> ProviderFuture<'a, Result<GeminiResponse, ProviderError>> {
        Box::pin(async move {
            let model = request.model.clone();
            let api_request = build_api_request(&request)?;
            let url = self.endpoint(&format!("{model}:generateContent"));
            let response = self
                .client
                .post(url)
                .header("x-goog-api-key", api_key)
                .json(&api_request)
                .send()
                .await
                .map_err(Self::map_send_error)?;

            if !response.status().is_success() {
                return Err(Self::parse_error(response).await);
            }

            let parsed: GeminiApiResponse = response
                .json()
                .await
                .map_err(|err| ProviderError::transport(err.to_string()))?;

            parsed.into_response(model)
        })
    }

    fn stream_generate<'a>(
        &'a self,
        request: GeminiRequest,
        api_key: String,
    ) -> ProviderFuture<'a, Result<GeminiChunkStream<'a>, ProviderError>> {
        Box::pin(async move {
            let model = request.model.clone();
            let api_request = build_api_request(&request)?;
            let url = self.endpoint(&format!("{model}:streamGenerateContent?alt=sse"));
            let response = self
                .client
                .post(url)
                .header("x-goog-api-key", api_key)
                .json(&api_request)
                .send()
                .await
                .map_err(Self::map_send_error)?;

            if !response.status().is_success() {
                return Err(Self::parse_error(response).await);
            }

            let stream = try_stream! {
                let mut chunks = response.bytes_stream();
                let mut sse_buffer = String::new();
                let mut usage = None;

                while let Some(item) = chunks.next().await {
                    let bytes = item.map_err(|err| ProviderError::transport(err.to_string()))?;
                    let text = std::str::from_utf8(&bytes)
                        .map_err(|err| ProviderError::transport(err.to_string()))?;
                    sse_buffer.push_str(text);

                    while let Some(newline_index) = sse_buffer.find('\n') {
                        let line = sse_buffer.drain(..=newline_index).collect::<String>();
                        let line = line.trim();

                        if !line.starts_with("data:") {
                            continue;
                        }

                        let payload = line.trim_start_matches("data:").trim();
                        if payload.is_empty() {
                            continue;
                        }

                        let parsed: GeminiApiResponse = serde_json::from_str(payload)
                            .map_err(|err| ProviderError::transport(err.to_string()))?;
                        parsed.reject_if_blocked()?;

                        let delta = parsed.text();
                        if let Some(metadata) = parsed.usage_metadata {
                            usage = Some(metadata.into_usage());
                        }

                        if !delta.is_empty() {
                            yield GeminiStreamChunk::TextDelta(delta);
                        }
                    }
                }

                if let Some(usage) = usage {
                    yield GeminiStreamChunk::UsageReport(usage);
                }
            };

            Ok(Box::pin(stream) as GeminiChunkStream<'a>)
        })
    }

    fn list_models<'a>(
        &'a self,
        api_key: String,
    ) -> ProviderFuture<'a, Result<Vec<ModelInfo>, ProviderError>> {
        Box::pin(async move {
            let url = self.endpoint("models?pageSize=1000");
            let response = self
                .client
                .get(url)
                .header("x-goog-api-key", api_key)
                .send()
                .await
                .map_err(Self::map_send_error)?;

            if !response.status().is_success() {
                return Err(Self::parse_error(response).await);
            }

            let parsed: GeminiApiModelList = response
                .json()
                .await
                .map_err(|err| ProviderError::transport(err.to_string()))?;

            Ok(parsed.models.into_iter().map(ModelInfo::from).collect())
        })
    }
}
