use std::fmt;

use bytes::Bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A media asset discovered while rendering, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReference {
    pub url: String,
    pub kind: MediaKind,
    pub alt_text: Option<String>,
}

/// Outcome for one distinct source URL of a materialization run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaResult {
    pub source_url: String,
    pub kind: MediaKind,
    pub alt_text: Option<String>,
    pub local_filename: Option<String>,
    pub byte_size: Option<u64>,
    pub mime_type: Option<String>,
    pub failure: Option<FetchError>,
    pub payload: Option<Bytes>,
}

impl MediaResult {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaProgress {
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Bytes received so far for one fetch.
    Downloading { url: String, bytes: u64 },
    /// One media reference settled, fetched or served from the session cache.
    Progress(MediaProgress),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Bytes,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    MalformedUrl,
    FetchFailed { status: Option<u16> },
    PayloadTooLarge { max_bytes: u64, actual: Option<u64> },
    Timeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::MalformedUrl => write!(f, "malformed url"),
            FailureKind::FetchFailed { status: Some(code) } => {
                write!(f, "fetch failed with http status {code}")
            }
            FailureKind::FetchFailed { status: None } => write!(f, "fetch failed"),
            FailureKind::PayloadTooLarge { max_bytes, actual } => {
                write!(f, "payload too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Timeout => write!(f, "timeout"),
        }
    }
}
