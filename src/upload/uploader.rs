use super::dns::{DnsError, RotatingDnsResolver};
use super::request::{DatadogRequest, HEADER_API_KEY, RequestFactory};
use super::status::{UploadError, UploadStatus};
use crate::domain::{LogLevel, LogTarget, RawBatchEvent};
use crate::internal_logger::InternalLogger;
use crate::sdk::DatadogContext;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, ClientBuilder, redirect};
use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Sends one batch to the intake and reports the outcome.
pub trait DataUploader: Send + Sync {
    fn upload(
        &self,
        context: &DatadogContext,
        batch: &[RawBatchEvent],
        batch_metadata: Option<&[u8]>,
    ) -> impl Future<Output = UploadStatus> + Send;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connection_timeout: Duration,
    pub user_agent: String,
    pub dns_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(45),
            connection_timeout: Duration::from_secs(10),
            user_agent: format!("dd-upload-pipeline/{}", env!("CARGO_PKG_VERSION")),
            dns_ttl: super::dns::DEFAULT_TTL,
        }
    }
}

/// `DataUploader` posting batches over HTTP.
///
/// Redirects are not followed: a 3xx from the intake is reported as such.
pub struct HttpDataUploader {
    client: Client,
    request_factory: Arc<dyn RequestFactory>,
    logger: Arc<dyn InternalLogger>,
}

impl HttpDataUploader {
    pub fn new(
        config: &ClientConfig,
        request_factory: Arc<dyn RequestFactory>,
        logger: Arc<dyn InternalLogger>,
    ) -> Result<Self, ClientError> {
        let resolver = RotatingDnsResolver::new(super::dns::SystemHostResolver, config.dns_ttl);
        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(config.connection_timeout)
            .user_agent(&config.user_agent)
            .redirect(redirect::Policy::none())
            .dns_resolver(Arc::new(resolver))
            .build()
            .map_err(|e| {
                ClientError::InvalidConfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            request_factory,
            logger,
        })
    }

    async fn execute(&self, request: DatadogRequest) -> Result<u16, UploadError> {
        let headers = self.build_headers(&request)?;
        let response = self
            .client
            .post(&request.url)
            .headers(headers)
            .body(request.body)
            .send()
            .await
            .map_err(classify_transport_error)?;
        Ok(response.status().as_u16())
    }

    fn build_headers(&self, request: &DatadogRequest) -> Result<HeaderMap, UploadError> {
        let mut headers = HeaderMap::with_capacity(request.headers.len());
        for (name, value) in &request.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| UploadError::RequestCreation(format!("invalid header {name}: {e}")))?;
            if header_name == USER_AGENT {
                self.logger.log_one(
                    LogLevel::Warn,
                    LogTarget::Maintainer,
                    "Ignoring the User-Agent header set by the request factory; it is reserved for the uploader.",
                );
                continue;
            }

            let is_api_key = name.eq_ignore_ascii_case(HEADER_API_KEY);
            let header_value = match HeaderValue::from_str(value) {
                Ok(v) if is_api_key && v.is_empty() => {
                    return Err(UploadError::InvalidToken("empty client token".to_string()));
                }
                Ok(v) => v,
                Err(e) if is_api_key => return Err(UploadError::InvalidToken(e.to_string())),
                Err(e) => {
                    return Err(UploadError::RequestCreation(format!(
                        "invalid value for header {name}: {e}"
                    )));
                }
            };
            headers.insert(header_name, header_value);
        }
        Ok(headers)
    }
}

impl DataUploader for HttpDataUploader {
    async fn upload(
        &self,
        context: &DatadogContext,
        batch: &[RawBatchEvent],
        batch_metadata: Option<&[u8]>,
    ) -> UploadStatus {
        let request = match self.request_factory.create(context, batch, batch_metadata) {
            Ok(request) => request,
            Err(e) => {
                self.logger.log(
                    LogLevel::Error,
                    &[LogTarget::User, LogTarget::Telemetry],
                    &format!("Unable to create the request, probably due to bad data format: {e}"),
                );
                return UploadStatus::from_error(&UploadError::RequestCreation(e.to_string()));
            }
        };
        UploadStatus::classify(self.execute(request).await)
    }
}

/// DNS failures are told apart from other transport errors by walking the cause chain.
pub fn classify_transport_error(error: reqwest::Error) -> UploadError {
    if error.is_builder() {
        return UploadError::RequestCreation(error.to_string());
    }

    let mut source: Option<&(dyn StdError + 'static)> = Some(&error);
    while let Some(cause) = source {
        if let Some(dns) = cause.downcast_ref::<DnsError>() {
            return UploadError::Dns(dns.to_string());
        }
        if cause.to_string().starts_with("dns error") {
            return UploadError::Dns(cause.to_string());
        }
        source = cause.source();
    }
    UploadError::Network(error_chain(&error))
}

fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
