//! Common type definitions and permission system types.
//!
//! This module defines:
//! - Type aliases for entity IDs (UserId, GroupId, etc.)
//! - Operation and resource enums used when reporting authorization failures
//!
//! # ID Types
//!
//! All entity IDs are UUIDs wrapped in type aliases:
//!
//! - [`UserId`]: Caller identity (the `sub` claim of a session token)
//! - [`GroupId`]: Group identifier
//! - [`WorkerModelId`]: Worker model identifier
//! - [`ProjectId`]: Project identifier
//! - [`PipelineId`]: Pipeline identifier
//!
//! # Utility Functions
//!
//! - [`abbrev_uuid`]: Abbreviate UUIDs to first 8 chars for logging

use std::fmt;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type GroupId = Uuid;
pub type WorkerModelId = Uuid;
pub type ProjectId = Uuid;
pub type PipelineId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

// Operations that can be performed on resources
// *-All means any entity, *-Own means restricted to entities of the caller's groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateAll,
    ReadAll,
    ReadOwn,
    UpdateAll,
    DeleteAll,
    DeleteOwn,
}

// Resources that can be operated on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    WorkerModels,
    Groups,
}

// Permission types for authorization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Simple permission: (Resource, Operation)
    Allow(Resource, Operation),
    /// Caller must belong to the group owning the resource
    GroupMember,
    /// Caller must administer the group owning the resource
    GroupAdmin,
    /// Logical combinators
    Any(Vec<Permission>),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateAll => write!(f, "create"),
            Operation::ReadAll | Operation::ReadOwn => write!(f, "read"),
            Operation::UpdateAll => write!(f, "update"),
            Operation::DeleteAll | Operation::DeleteOwn => write!(f, "delete"),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::WorkerModels => write!(f, "worker model"),
            Resource::Groups => write!(f, "group"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }

    #[test]
    fn test_operation_display_collapses_scope() {
        assert_eq!(Operation::UpdateAll.to_string(), "update");
        assert_eq!(Operation::ReadOwn.to_string(), "read");
        assert_eq!(Operation::DeleteOwn.to_string(), "delete");
    }
}
