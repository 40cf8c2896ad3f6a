//! Resource and access-event primitives.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a tracked resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// Source code
    Code,
    /// Documentation (markdown, prose)
    Documentation,
    /// Structured data (JSON, CSV, ...)
    Data,
    /// Research material
    Research,
    /// Generated artifacts
    Generated,
}

impl ResourceType {
    /// Stable string form for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Code => "code",
            ResourceType::Documentation => "documentation",
            ResourceType::Data => "data",
            ResourceType::Research => "research",
            ResourceType::Generated => "generated",
        }
    }

    /// Parse from the stable string form. Unknown values map to `Generated`.
    pub fn parse(s: &str) -> Self {
        match s {
            "code" => ResourceType::Code,
            "documentation" => ResourceType::Documentation,
            "data" => ResourceType::Data,
            "research" => ResourceType::Research,
            _ => ResourceType::Generated,
        }
    }
}

/// How a resource was accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    /// Content was read
    View,
    /// Content was changed
    Edit,
    /// Resource was executed
    Execute,
    /// Resource was mentioned without being opened
    Reference,
}

impl AccessType {
    /// Stable string form for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::View => "view",
            AccessType::Edit => "edit",
            AccessType::Execute => "execute",
            AccessType::Reference => "reference",
        }
    }

    /// Parse from the stable string form. Unknown values map to `View`.
    pub fn parse(s: &str) -> Self {
        match s {
            "edit" => AccessType::Edit,
            "execute" => AccessType::Execute,
            "reference" => AccessType::Reference,
            _ => AccessType::View,
        }
    }
}

/// Optional details attached to a single access.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AccessMetadata {
    /// Size of the resource in bytes, when known
    pub size_bytes: Option<u64>,
    /// Whether this access modified the resource
    pub modified: bool,
}

impl AccessMetadata {
    /// Metadata carrying only a size.
    pub fn with_size(size_bytes: u64) -> Self {
        Self {
            size_bytes: Some(size_bytes),
            modified: false,
        }
    }

    /// Metadata marking a modification.
    pub fn modifying() -> Self {
        Self {
            size_bytes: None,
            modified: true,
        }
    }
}

/// Immutable fact: a resource was accessed at a point in time within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessEvent {
    /// Owning session id
    pub session_id: String,
    /// Normalized resource path
    pub path: String,
    /// Resource category
    pub resource_type: ResourceType,
    /// Kind of access
    pub access_type: AccessType,
    /// When the access happened
    pub timestamp: DateTime<Utc>,
    /// Access details
    pub metadata: AccessMetadata,
}

/// In-memory per-resource access statistics.
///
/// Importance is always derived from these fields, never stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceStats {
    /// Normalized resource path (identity)
    pub path: String,
    /// Resource category
    pub resource_type: ResourceType,
    /// Size in bytes, when known
    pub size_bytes: Option<u64>,
    /// Number of accesses seen (monotone)
    pub access_count: u64,
    /// Most recent access time
    pub last_accessed: DateTime<Utc>,
    /// Access kinds seen over the resource's lifetime
    pub access_types_seen: HashSet<AccessType>,
    /// Sticky modification flag (false -> true only)
    pub modified: bool,
}

/// Denormalized session-resource row returned by the store gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResource {
    /// Normalized resource path
    pub path: String,
    /// Resource category
    pub resource_type: ResourceType,
    /// Size in bytes, when known
    pub size_bytes: Option<u64>,
    /// Persisted access count
    pub access_count: u64,
    /// Most recent access time
    pub last_accessed: DateTime<Utc>,
    /// Persisted modification flag
    pub modified: bool,
    /// Importance cached by the last prioritization run
    pub importance_score: f64,
    /// Whether the last run selected this resource
    pub included_in_context: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_round_trip() {
        for rt in [
            ResourceType::Code,
            ResourceType::Documentation,
            ResourceType::Data,
            ResourceType::Research,
            ResourceType::Generated,
        ] {
            assert_eq!(ResourceType::parse(rt.as_str()), rt);
        }
    }

    #[test]
    fn test_unknown_resource_type_maps_to_generated() {
        assert_eq!(ResourceType::parse("weird"), ResourceType::Generated);
    }

    #[test]
    fn test_access_type_round_trip() {
        for at in [
            AccessType::View,
            AccessType::Edit,
            AccessType::Execute,
            AccessType::Reference,
        ] {
            assert_eq!(AccessType::parse(at.as_str()), at);
        }
    }

    #[test]
    fn test_serde_uses_lowercase_forms() {
        assert_eq!(
            serde_json::to_string(&ResourceType::Documentation).unwrap(),
            "\"documentation\""
        );
        assert_eq!(
            serde_json::to_string(&AccessType::Reference).unwrap(),
            "\"reference\""
        );

        let parsed: AccessType = serde_json::from_str("\"edit\"").unwrap();
        assert_eq!(parsed, AccessType::Edit);
    }

    #[test]
    fn test_metadata_helpers() {
        let m = AccessMetadata::with_size(42);
        assert_eq!(m.size_bytes, Some(42));
        assert!(!m.modified);

        let m = AccessMetadata::modifying();
        assert!(m.modified);
        assert!(m.size_bytes.is_none());
    }
}
