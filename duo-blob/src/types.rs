use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key stem of an uploaded image: `<prefix>/<id>.<ext>`.
///
/// Always a fresh v4 UUID, so two uploads never share an object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobId(pub String);

impl BlobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap a stem that was already assigned, e.g. parsed back out of a key
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BlobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BlobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
