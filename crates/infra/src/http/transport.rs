use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client as ReqwestClient, Method};
use resync_common::error::{CommonError, CommonResult};
use resync_core::Transport;
use resync_domain::{ApiRequest, ApiResponse, ClientSettings, HttpMethod};
use tracing::{debug, warn};
use url::Url;

use crate::errors::conversions::describe;

/// [`Transport`] backed by a pooled `reqwest` client.
///
/// Relative request URIs are appended to the base URL, keeping any path the
/// base already has. Every failure to obtain a response (connect error,
/// timeout, unbuildable request) is reported as
/// [`ApiResponse::not_made`]; any response the server sends back, whatever
/// its status, is passed through with its body.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: ReqwestClient,
    base_url: Url,
}

impl ReqwestTransport {
    /// Start building a transport for `base_url`.
    pub fn builder(base_url: impl Into<String>) -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::new(base_url)
    }

    /// Transport using the base URL and request timeout from `settings`.
    pub fn from_settings(settings: &ClientSettings) -> CommonResult<Self> {
        Self::builder(settings.base_url.clone()).timeout(settings.request_timeout()).build()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resolve(&self, uri: &str) -> Result<Url, url::ParseError> {
        if let Ok(absolute) = Url::parse(uri) {
            return Ok(absolute);
        }
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{}/{}", base, uri.trim_start_matches('/')))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> ApiResponse {
        let url = match self.resolve(&request.uri) {
            Ok(url) => url,
            Err(err) => {
                warn!(uri = %request.uri, error = %err, "Cannot build request URL");
                return ApiResponse::not_made();
            }
        };

        let method = method_for(request.method);
        let mut builder = self.client.request(method.clone(), url.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.header(CONTENT_TYPE, body.content_type.as_str()).body(body.bytes.clone());
        }

        debug!(%method, %url, "sending HTTP request");

        match builder.send().await {
            Ok(response) => {
                let status = response.status();
                debug!(%method, %url, %status, "received HTTP response");
                match response.bytes().await {
                    Ok(bytes) => ApiResponse::new(status.as_u16(), bytes.to_vec()),
                    Err(err) => {
                        warn!(%method, %url, %status, error = %describe(&err), "Failed to read response body");
                        ApiResponse::new(status.as_u16(), Vec::new())
                    }
                }
            }
            Err(err) => {
                debug!(%method, %url, error = %describe(&err), "HTTP request failed");
                ApiResponse::not_made()
            }
        }
    }
}

fn method_for(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug)]
pub struct ReqwestTransportBuilder {
    base_url: String,
    timeout: Duration,
    user_agent: String,
    default_headers: Option<reqwest::header::HeaderMap>,
}

impl ReqwestTransportBuilder {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: ClientSettings::default().request_timeout(),
            user_agent: concat!("resync/", env!("CARGO_PKG_VERSION")).to_string(),
            default_headers: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    pub fn default_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    /// # Errors
    ///
    /// Returns [`CommonError::Config`] if the base URL does not parse or the
    /// underlying client cannot be created.
    pub fn build(self) -> CommonResult<ReqwestTransport> {
        let base_url = Url::parse(&self.base_url).map_err(|e| {
            CommonError::config(format!("Invalid base URL '{}': {}", self.base_url, e))
        })?;

        let mut builder =
            ReqwestClient::builder().timeout(self.timeout).user_agent(self.user_agent).no_proxy();
        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder
            .build()
            .map_err(|e| CommonError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(ReqwestTransport { client, base_url })
    }
}
