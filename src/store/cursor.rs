//! Continuation cursor shared by the bundled stores
//!
//! A token is base64 of the JSON pair `[partitionKey, id]` naming the last
//! key returned. The next page starts strictly after it, so documents
//! removed or added behind the cursor never shift the scan.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use super::errors::{StoreError, StoreResult};

/// Position in a key-ordered scan
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor {
    pub partition_key: String,
    pub id: String,
}

impl Cursor {
    pub fn new(partition_key: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            id: id.into(),
        }
    }

    /// Encode into an opaque continuation token
    pub fn encode(&self) -> String {
        let pair = serde_json::json!([self.partition_key, self.id]);
        URL_SAFE_NO_PAD.encode(pair.to_string())
    }

    /// Decode a token produced by `encode`
    pub fn decode(token: &str) -> StoreResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| StoreError::InvalidContinuation(e.to_string()))?;
        let (partition_key, id): (String, String) = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::InvalidContinuation(e.to_string()))?;
        Ok(Self { partition_key, id })
    }

    /// Key tuple for ordered comparison
    pub fn key(&self) -> (&str, &str) {
        (&self.partition_key, &self.id)
    }
}
