use crate::domain::RawBatchEvent;
use crate::sdk::DatadogContext;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use thiserror::Error;
use url::Url;

pub const HEADER_API_KEY: &str = "DD-API-KEY";
pub const HEADER_EVP_ORIGIN: &str = "DD-EVP-ORIGIN";
pub const HEADER_EVP_ORIGIN_VERSION: &str = "DD-EVP-ORIGIN-VERSION";
pub const HEADER_REQUEST_ID: &str = "DD-REQUEST-ID";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_CONTENT_ENCODING: &str = "Content-Encoding";
pub const QUERY_PARAM_SOURCE: &str = "ddsource";

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT_UTF8: &str = "text/plain;charset=UTF-8";

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Invalid intake URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Compression failed: {0}")]
    Compression(#[from] std::io::Error),
}

/// How events of a batch are joined into one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadDecoration {
    pub prefix: &'static str,
    pub separator: &'static str,
    pub suffix: &'static str,
}

impl PayloadDecoration {
    pub const JSON_ARRAY: Self = Self {
        prefix: "[",
        separator: ",",
        suffix: "]",
    };

    pub const NEW_LINE: Self = Self {
        prefix: "",
        separator: "\n",
        suffix: "",
    };

    pub fn join(&self, events: &[RawBatchEvent]) -> Vec<u8> {
        let payload_size: usize = events.iter().map(RawBatchEvent::len).sum();
        let mut body = Vec::with_capacity(
            self.prefix.len()
                + payload_size
                + self.separator.len() * events.len().saturating_sub(1)
                + self.suffix.len(),
        );
        body.extend_from_slice(self.prefix.as_bytes());
        for (i, event) in events.iter().enumerate() {
            if i > 0 {
                body.extend_from_slice(self.separator.as_bytes());
            }
            body.extend_from_slice(&event.data);
        }
        body.extend_from_slice(self.suffix.as_bytes());
        body
    }
}

/// A fully built intake request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatadogRequest {
    pub id: String,
    pub description: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl DatadogRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Builds the request carrying one batch.
pub trait RequestFactory: Send + Sync {
    fn create(
        &self,
        context: &DatadogContext,
        batch: &[RawBatchEvent],
        batch_metadata: Option<&[u8]>,
    ) -> Result<DatadogRequest, RequestError>;
}

/// Request factory of the JSON intakes: one payload per batch, framed with a
/// `PayloadDecoration`, optionally gzip-compressed.
#[derive(Debug, Clone)]
pub struct DefaultRequestFactory {
    intake_url: String,
    decoration: PayloadDecoration,
    compress: bool,
}

impl DefaultRequestFactory {
    pub fn new(intake_url: impl Into<String>, decoration: PayloadDecoration, compress: bool) -> Self {
        Self {
            intake_url: intake_url.into(),
            decoration,
            compress,
        }
    }

    fn content_type(&self) -> &'static str {
        if self.decoration == PayloadDecoration::JSON_ARRAY {
            CONTENT_TYPE_JSON
        } else {
            CONTENT_TYPE_TEXT_UTF8
        }
    }
}

impl RequestFactory for DefaultRequestFactory {
    fn create(
        &self,
        context: &DatadogContext,
        batch: &[RawBatchEvent],
        _batch_metadata: Option<&[u8]>,
    ) -> Result<DatadogRequest, RequestError> {
        let mut url = Url::parse(&self.intake_url)?;
        url.query_pairs_mut()
            .append_pair(QUERY_PARAM_SOURCE, &context.source);

        let request_id = uuid::Uuid::new_v4().to_string();
        let mut headers = vec![
            (HEADER_API_KEY.to_string(), context.client_token.clone()),
            (HEADER_EVP_ORIGIN.to_string(), context.source.clone()),
            (HEADER_EVP_ORIGIN_VERSION.to_string(), context.sdk_version.clone()),
            (HEADER_REQUEST_ID.to_string(), request_id.clone()),
            (HEADER_CONTENT_TYPE.to_string(), self.content_type().to_string()),
        ];

        let mut body = self.decoration.join(batch);
        if self.compress {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
            encoder.write_all(&body)?;
            body = encoder.finish()?;
            headers.push((HEADER_CONTENT_ENCODING.to_string(), "gzip".to_string()));
        }

        Ok(DatadogRequest {
            id: request_id.clone(),
            description: format!("{} request ({request_id})", context.source),
            url: url.into(),
            headers,
            body,
        })
    }
}
