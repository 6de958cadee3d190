use std::fmt;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{DecodeError, RawDocument};

pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_IMAGE_URL_BACK: &str = "imageUrlBack";
pub const FIELD_IMAGE_URL_FRONT: &str = "imageUrlFront";
pub const FIELD_TIMESTAMP: &str = "timestamp";

/// Store-assigned identifier of a post
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostId(pub String);

impl PostId {
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PostId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A published post. Never modified after it is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub description: String,
    /// Back camera image
    pub primary_image_url: String,
    /// Front camera image; absent on posts from before dual capture
    pub secondary_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Short clock time in the local timezone, e.g. `3:07 PM`
    pub fn display_time(&self) -> String {
        self.display_time_in(&Local)
    }

    pub fn display_time_in<Tz: TimeZone>(&self, tz: &Tz) -> String
    where
        Tz::Offset: fmt::Display,
    {
        self.created_at
            .with_timezone(tz)
            .format("%-I:%M %p")
            .to_string()
    }
}

/// Persisted shape of a post document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub description: String,
    #[serde(rename = "imageUrlBack")]
    pub image_url_back: String,
    #[serde(rename = "imageUrlFront", default, skip_serializing_if = "Option::is_none")]
    pub image_url_front: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl PostRecord {
    pub fn into_post(self, id: PostId) -> Post {
        Post {
            id,
            description: self.description,
            primary_image_url: self.image_url_back,
            secondary_image_url: self.image_url_front,
            created_at: self.timestamp,
        }
    }
}

/// Decode one stored record. A missing `imageUrlFront` is fine; a missing or
/// blank `description` or `imageUrlBack` is not.
pub fn decode_post(document: &RawDocument) -> Result<Post, DecodeError> {
    let record: PostRecord =
        serde_json::from_value(serde_json::Value::Object(document.fields.clone()))
            .map_err(|e| DecodeError::new(&document.id, e))?;

    if record.description.trim().is_empty() {
        return Err(DecodeError::new(&document.id, "blank `description`"));
    }
    if record.image_url_back.trim().is_empty() {
        return Err(DecodeError::new(&document.id, "blank `imageUrlBack`"));
    }

    Ok(record.into_post(PostId::from_string(document.id.clone())))
}

/// Ordered point-in-time view of the feed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedSnapshot {
    /// Newest first
    pub posts: Vec<Post>,
    /// Records left out because they failed to decode
    pub skipped: usize,
}

/// Decode a whole snapshot, dropping records that fail to decode
pub fn decode_snapshot(documents: &[RawDocument]) -> FeedSnapshot {
    let mut skipped = 0;
    let mut posts: Vec<Post> = documents
        .iter()
        .filter_map(|document| match decode_post(document) {
            Ok(post) => Some(post),
            Err(e) => {
                warn!("Error decoding post: {}", e);
                skipped += 1;
                None
            }
        })
        .collect();

    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    FeedSnapshot { posts, skipped }
}
