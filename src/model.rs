//! Core data model.
//!
//! An art request is one queued unit of work: the prompts, the satellite it
//! came from, and the raw signature image derived from that satellite's
//! orbital velocity vector. An artwork is the persisted record of a
//! completed generation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Art request (queue payload)
// ---------------------------------------------------------------------------

/// One generation request, as carried in the queue message payload.
/// Immutable once enqueued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub satellite_name: String,
    /// Display name the finished artwork will carry.
    pub image_name: String,
    /// Raw signature image (a small PNG raster). Rides inside the JSON
    /// payload base64-encoded.
    #[serde(with = "base64_bytes")]
    pub signature_png: Vec<u8>,
}

impl ArtRequest {
    /// Build a request, rejecting missing or empty fields up front so the
    /// worker can assume well-formed items.
    pub fn new(
        prompt: impl Into<String>,
        negative_prompt: impl Into<String>,
        satellite_name: impl Into<String>,
        image_name: impl Into<String>,
        signature_png: Vec<u8>,
    ) -> Result<Self> {
        let request = Self {
            prompt: prompt.into(),
            negative_prompt: negative_prompt.into(),
            satellite_name: satellite_name.into(),
            image_name: image_name.into(),
            signature_png,
        };
        request.validate()?;
        Ok(request)
    }

    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("prompt", &self.prompt),
            ("negativePrompt", &self.negative_prompt),
            ("satelliteName", &self.satellite_name),
            ("imageName", &self.image_name),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Validation(format!("missing required field: {field}")));
            }
        }
        if self.signature_png.is_empty() {
            return Err(Error::Validation("missing required field: image".to_string()));
        }
        Ok(())
    }
}

/// Opaque identifier a queued request gets at enqueue time (the pgmq
/// message id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub i64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Queue counts
// ---------------------------------------------------------------------------

/// Best-effort snapshot of queue membership. Feeds the informational UI
/// indicator only, never a correctness decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub waiting: i64,
    pub active: i64,
}

// ---------------------------------------------------------------------------
// Artwork
// ---------------------------------------------------------------------------

/// A completed generation result. Created exactly once per successfully
/// processed request; never mutated by this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artwork {
    pub id: Uuid,
    pub name: String,
    pub prompt: String,
    pub negative_prompt: String,
    pub satellite_name: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

/// One page of the gallery read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryPage {
    pub artworks: Vec<Artwork>,
    pub current_page: i64,
    pub total_pages: i64,
    pub total_artworks: i64,
}

// ---------------------------------------------------------------------------
// serde helper: Vec<u8> <-> base64 string
// ---------------------------------------------------------------------------

mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_roundtrips_through_json() {
        let request = ArtRequest::new(
            "nebula over the pacific",
            "blurry, low quality",
            "ISS (ZARYA)",
            "Zarya Pass #1",
            vec![0x89, 0x50, 0x4e, 0x47],
        )
        .unwrap();

        let json = serde_json::to_value(&request).unwrap();
        // Bytes are transported as base64 text inside the payload.
        assert!(json["signature_png"].is_string());

        let back: ArtRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back.signature_png, request.signature_png);
        assert_eq!(back.prompt, request.prompt);
    }

    #[test]
    fn empty_prompt_rejected() {
        let err = ArtRequest::new("", "neg", "sat", "name", vec![1]).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn whitespace_only_field_rejected() {
        let err = ArtRequest::new("p", "  ", "sat", "name", vec![1]).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn empty_image_rejected() {
        let err = ArtRequest::new("p", "n", "sat", "name", vec![]).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
