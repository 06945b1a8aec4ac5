use std::time::Duration;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;

use crate::{EngineEvent, FailureKind, FetchError, FetchMetadata, FetchOutput};

/// Payload cap for a single fetch.
pub const DEFAULT_MAX_BYTES: u64 = 50 * 1024 * 1024;

/// Inline payloads are often written without trailing padding.
const DATA_URL_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&self, _event: EngineEvent) {}
}

/// One GET per call; failures come back as data.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, sink: &dyn ProgressSink) -> Result<FetchOutput, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .build()
            .map_err(|err| FetchError::new(FailureKind::FetchFailed { status: None }, err.to_string()))?;
        Ok(Self { settings, client })
    }

    fn too_large(&self, actual: u64) -> FetchError {
        FetchError::new(
            FailureKind::PayloadTooLarge {
                max_bytes: self.settings.max_bytes,
                actual: Some(actual),
            },
            "response too large",
        )
    }

    /// Decode a `data:[<mime>][;base64],<payload>` url without touching the network.
    fn decode_data_url(&self, url: &str, sink: &dyn ProgressSink) -> Result<FetchOutput, FetchError> {
        let malformed = |message: &str| FetchError::new(FailureKind::MalformedUrl, message);
        let (header, payload) = url
            .get(DATA_SCHEME.len()..)
            .and_then(|rest| rest.split_once(','))
            .ok_or_else(|| malformed("data url without payload"))?;

        let (media_type, is_base64) = match header.rsplit_once(';') {
            Some((media_type, flag)) if flag.trim().eq_ignore_ascii_case("base64") => {
                (media_type, true)
            }
            _ if header.trim().eq_ignore_ascii_case("base64") => ("", true),
            _ => (header, false),
        };
        let media_type = media_type.trim();
        let content_type = if media_type.is_empty() || media_type.starts_with(';') {
            format!("text/plain{media_type}")
        } else {
            media_type.to_string()
        };

        let unescaped: Vec<u8> = percent_encoding::percent_decode_str(payload).collect();
        let bytes = if is_base64 {
            let compact: Vec<u8> = unescaped
                .into_iter()
                .filter(|byte| !byte.is_ascii_whitespace())
                .collect();
            DATA_URL_BASE64
                .decode(compact)
                .map_err(|err| malformed(&format!("invalid base64 payload: {err}")))?
        } else {
            unescaped
        };

        let byte_len = bytes.len() as u64;
        if byte_len > self.settings.max_bytes {
            return Err(self.too_large(byte_len));
        }
        sink.emit(EngineEvent::Downloading {
            url: url.to_string(),
            bytes: byte_len,
        });
        Ok(FetchOutput {
            bytes: Bytes::from(bytes),
            metadata: FetchMetadata {
                original_url: url.to_string(),
                final_url: url.to_string(),
                content_type: Some(content_type),
                byte_len,
            },
        })
    }
}

const DATA_SCHEME: &str = "data:";

fn is_data_url(url: &str) -> bool {
    url.get(..DATA_SCHEME.len())
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case(DATA_SCHEME))
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str, sink: &dyn ProgressSink) -> Result<FetchOutput, FetchError> {
        if is_data_url(url) {
            return self.decode_data_url(url, sink);
        }
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::MalformedUrl, err.to_string()))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::FetchFailed {
                    status: Some(status.as_u16()),
                },
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(self.too_large(content_len));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        sink.emit(EngineEvent::Downloading {
            url: url.to_string(),
            bytes: 0,
        });

        let mut buffer = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = buffer.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(self.too_large(next_len));
            }
            buffer.extend_from_slice(&chunk);
            sink.emit(EngineEvent::Downloading {
                url: url.to_string(),
                bytes: buffer.len() as u64,
            });
        }

        let bytes = buffer.freeze();
        let metadata = FetchMetadata {
            original_url: url.to_string(),
            final_url,
            content_type,
            byte_len: bytes.len() as u64,
        };

        Ok(FetchOutput { bytes, metadata })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    FetchError::new(
        FailureKind::FetchFailed {
            status: err.status().map(|status| status.as_u16()),
        },
        err.to_string(),
    )
}
