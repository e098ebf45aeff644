//! Authorization and validation rules for worker models.
//!
//! - [`validator`]: caller-independent structural and type-specific checks
//! - [`engine`]: role-dependent sanitizing of create/update requests, update and delete rights
//! - [`visibility`]: which owning groups a caller may list
//! - [`editable`]: the per-caller `editable` response flag
//!
//! Everything here is pure: callers resolve the groups and stored models first and hand them in.

pub mod editable;
pub mod engine;
pub mod validator;
pub mod visibility;
