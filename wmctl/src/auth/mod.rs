//! Authentication.
//!
//! Callers present a signed JWT either as `Authorization: Bearer <token>` or in the session
//! cookie named by `auth.session.cookie_name`. The token identifies the user and their platform
//! role; group memberships are loaded from the store for every request so that a membership
//! change takes effect immediately.
//!
//! Authorization decisions live in [`crate::policy`], not here.
//!
//! # Modules
//!
//! - [`current_user`]: [`CurrentUser`](crate::api::models::users::CurrentUser) extractor
//! - [`session`]: JWT creation and verification
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use wmctl::api::models::users::CurrentUser;
//!
//! async fn protected_handler(current_user: CurrentUser) -> String {
//!     format!("Hello, {}!", current_user.username)
//! }
//! ```

pub mod current_user;
pub mod session;
