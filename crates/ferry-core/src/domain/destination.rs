//! Upload destination parameters forwarded to the transport.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Where an upload should land on the server.
///
/// The queue never looks inside; it is stored on the item and passed to the
/// transport on every attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Destination {
    /// Target folder / collection in the media library.
    pub folder: Option<String>,
    /// Extra form fields (alt text, tags, ...).
    pub metadata: BTreeMap<String, String>,
}

impl Destination {
    pub fn folder(folder: impl Into<String>) -> Self {
        Self {
            folder: Some(folder.into()),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
