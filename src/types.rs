use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mapping::MappingError;

/// Kinds of domain entity that can be addressed through an external id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Student,
    Book,
    Equipment,
    User,
    Checkout,
}

impl EntityType {
    pub const ALL: [EntityType; 5] =
        [EntityType::Student, EntityType::Book, EntityType::Equipment, EntityType::User, EntityType::Checkout];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Student => "student",
            EntityType::Book => "book",
            EntityType::Equipment => "equipment",
            EntityType::User => "user",
            EntityType::Checkout => "checkout",
        }
    }

    /// Domain table holding rows of this kind.
    pub fn table(&self) -> &'static str {
        match self {
            EntityType::Student => "students",
            EntityType::Book => "books",
            EntityType::Equipment => "equipment",
            EntityType::User => "users",
            EntityType::Checkout => "checkouts",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(EntityType::Student),
            "book" => Ok(EntityType::Book),
            "equipment" => Ok(EntityType::Equipment),
            "user" => Ok(EntityType::User),
            "checkout" => Ok(EntityType::Checkout),
            other => Err(MappingError::validation("entity_type", format!("unrecognized entity type '{}'", other))),
        }
    }
}

/// A persisted `(entity_type, external_id) -> internal_id` association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub id: String,
    pub entity_type: EntityType,
    pub external_id: String,
    pub internal_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: i64,
    pub is_active: bool,
    pub metadata: Option<serde_json::Value>,
}

impl Mapping {
    pub fn new(
        entity_type: EntityType,
        external_id: &str,
        internal_id: &str,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            entity_type,
            external_id: external_id.to_string(),
            internal_id: internal_id.to_string(),
            created_at: now,
            updated_at: now,
            last_accessed: now,
            access_count: 0,
            is_active: true,
            metadata,
        }
    }
}

/// One entry of a bulk ingestion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkMappingItem {
    pub external_id: String,
    pub internal_id: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkMappingError {
    pub external_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkMappingResult {
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<BulkMappingError>,
    pub duration_ms: u64,
}

/// Aggregates produced by the store for one entity type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub avg_access_count: f64,
    pub stale: i64,
    pub last_accessed: Option<DateTime<Utc>>,
    pub last_created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingStats {
    pub entity_type: EntityType,
    pub total_mappings: i64,
    pub active_mappings: i64,
    pub inactive_mappings: i64,
    pub average_access_count: f64,
    pub most_accessed: Vec<Mapping>,
    pub stale_mappings: i64,
    pub last_accessed: Option<DateTime<Utc>>,
    pub last_created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Duplicate,
    Orphaned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub severity: IssueSeverity,
    pub external_id: String,
    pub internal_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub entity_type: EntityType,
    pub is_valid: bool,
    pub total_mappings: usize,
    pub valid_mappings: usize,
    pub invalid_mappings: usize,
    pub issues: Vec<ValidationIssue>,
}

// Request/response DTOs for the HTTP surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMappingRequest {
    pub entity_type: String,
    pub external_id: String,
    pub internal_id: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkMappingRequest {
    pub items: Vec<BulkMappingItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupRequest {
    pub older_than: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub entity_type: EntityType,
    pub deleted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupResponse {
    pub entity_type: EntityType,
    pub external_id: String,
    pub internal_id: String,
}
