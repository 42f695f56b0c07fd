//! Document addressing and versioning primitives.

use serde::{Deserialize, Serialize};

/// Address of a single document: a collection name plus a document id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocRef {
    collection: String,
    id: String,
}

impl DocRef {
    /// Creates a reference to `collection/id`.
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Returns the collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the document id within the collection.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Display for DocRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Per-document revision counter, incremented on every committed write.
///
/// Used for optimistic concurrency: a transaction records the version it
/// observed for each read and the commit fails if any document has moved on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a version from a raw counter value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// The version assigned to a document on its first write.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw counter value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A document read from the store: its JSON payload plus current version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedDoc {
    /// Current revision of the document.
    pub version: Version,
    /// The document payload.
    pub data: serde_json::Value,
}

impl VersionedDoc {
    /// Deserializes the payload into a typed record.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_ref_display() {
        let doc = DocRef::new("products", "p1");
        assert_eq!(doc.to_string(), "products/p1");
        assert_eq!(doc.collection(), "products");
        assert_eq!(doc.id(), "p1");
    }

    #[test]
    fn version_ordering() {
        assert!(Version::first() < Version::first().next());
        assert_eq!(Version::first().next().as_i64(), 2);
    }

    #[test]
    fn versioned_doc_decode() {
        let doc = VersionedDoc {
            version: Version::first(),
            data: serde_json::json!({"name": "Widget"}),
        };

        #[derive(serde::Deserialize)]
        struct Named {
            name: String,
        }

        let named: Named = doc.decode().unwrap();
        assert_eq!(named.name, "Widget");
    }
}
