//! Tagged media payloads
//!
//! Image, audio and video travel inline as `"<KIND>:<base64>"` strings with
//! standard, unwrapped base64. The router never re-encodes them: a parsed
//! [`MediaPayload`] keeps the original string and decodes lazily.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::category::ContentKind;
use crate::error::MediaError;

/// Media tag carried before the colon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

impl MediaKind {
    /// Wire tag (`IMG`, `AUDIO`, `VIDEO`)
    pub fn tag(self) -> &'static str {
        match self {
            MediaKind::Image => "IMG",
            MediaKind::Audio => "AUDIO",
            MediaKind::Video => "VIDEO",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "IMG" => Some(MediaKind::Image),
            "AUDIO" => Some(MediaKind::Audio),
            "VIDEO" => Some(MediaKind::Video),
            _ => None,
        }
    }

    /// Media kind expected for a content category
    pub fn for_content(kind: ContentKind) -> Option<Self> {
        match kind {
            ContentKind::Text => None,
            ContentKind::Image => Some(MediaKind::Image),
            ContentKind::Audio => Some(MediaKind::Audio),
            ContentKind::Video => Some(MediaKind::Video),
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A validated media blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPayload {
    kind: MediaKind,
    /// Full `KIND:base64` string as received
    raw: String,
}

impl MediaPayload {
    /// Parse and validate a `KIND:base64` string
    pub fn parse(raw: &str) -> Result<Self, MediaError> {
        let (tag, body) = raw.split_once(':').ok_or(MediaError::MissingTag)?;
        let kind = MediaKind::from_tag(tag).ok_or(MediaError::UnknownKind)?;

        STANDARD
            .decode(body)
            .map_err(|_| MediaError::InvalidBase64)?;

        Ok(Self {
            kind,
            raw: raw.to_string(),
        })
    }

    /// Parse a blob and require it to match the given category kind
    pub fn parse_for(content: ContentKind, raw: &str) -> Result<Self, MediaError> {
        let payload = Self::parse(raw)?;
        if MediaKind::for_content(content) != Some(payload.kind) {
            return Err(MediaError::KindMismatch);
        }
        Ok(payload)
    }

    /// Build a blob from raw bytes
    pub fn encode(kind: MediaKind, data: &[u8]) -> Self {
        Self {
            kind,
            raw: format!("{}:{}", kind.tag(), STANDARD.encode(data)),
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Original wire string
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Encoded body length in bytes (without the tag)
    pub fn encoded_len(&self) -> usize {
        self.raw.len() - self.kind.tag().len() - 1
    }

    /// Decode the body
    pub fn decode(&self) -> Result<Vec<u8>, MediaError> {
        let body = &self.raw[self.kind.tag().len() + 1..];
        STANDARD.decode(body).map_err(|_| MediaError::InvalidBase64)
    }
}
