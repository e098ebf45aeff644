//! HTTP request handlers.
//!
//! Each handler extracts the caller as a [`crate::api::models::users::CurrentUser`], so a request
//! without valid credentials is rejected with 401 before any handler code runs. Authorization is
//! delegated to [`crate::policy`]; handlers only sequence policy, store and cache calls.
//!
//! Handlers return [`crate::errors::Error`], which converts into a status code and a JSON
//! `{code, message, field}` body.
//!
//! - [`worker_models`]: the worker model catalog

pub mod worker_models;
