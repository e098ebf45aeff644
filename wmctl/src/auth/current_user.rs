use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session::{self, SessionClaims},
    config::Config,
    db::store::GroupDirectory,
    errors::{Error, Result},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, instrument, trace};

/// Extract session claims from an `Authorization: Bearer` header if present
/// Returns:
/// - None: No bearer token present
/// - Some(Ok(claims)): Token found and verified
/// - Some(Err(error)): Token present but invalid/expired
#[instrument(skip(parts, config))]
fn try_bearer_auth(parts: &Parts, config: &Config) -> Option<Result<SessionClaims>> {
    let auth_header = parts.headers.get(axum::http::header::AUTHORIZATION)?;

    let header_str = match auth_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid authorization header: {e}"),
            }));
        }
    };

    let token = header_str.strip_prefix("Bearer ")?;
    Some(session::verify_session_token(token.trim(), config))
}

/// Extract session claims from the session cookie if present and valid
/// Returns:
/// - None: No session cookie present
/// - Some(Ok(claims)): Valid JWT found and verified
/// - Some(Err(error)): Cookie header present but unreadable
#[instrument(skip(parts, config))]
fn try_cookie_auth(parts: &Parts, config: &Config) -> Option<Result<SessionClaims>> {
    let cookie_header = parts.headers.get(axum::http::header::COOKIE)?;

    let cookie_str = match cookie_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::BadRequest {
                message: format!("Invalid cookie header: {e}"),
            }));
        }
    };
    let cookie_name = &config.auth.session.cookie_name;

    for cookie in cookie_str.split(';') {
        if let Some((name, value)) = cookie.trim().split_once('=')
            && name == cookie_name
        {
            match session::verify_session_token(value, config) {
                Ok(claims) => return Some(Ok(claims)),
                // Expired cookies are routine; keep looking for a valid one
                Err(e) => trace!("Ignoring invalid session cookie: {e}"),
            }
        }
    }
    None
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        // A bearer token wins over the cookie; a bad token falls back to the cookie.
        let mut auth_error = None;

        let claims = match try_bearer_auth(parts, &state.config) {
            Some(Ok(claims)) => Some(claims),
            Some(Err(e)) => {
                trace!("Bearer authentication failed: {:?}", e);
                auth_error = Some(e);
                None
            }
            None => None,
        };

        let claims = match claims {
            Some(claims) => claims,
            None => match try_cookie_auth(parts, &state.config) {
                Some(Ok(claims)) => claims,
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(match auth_error {
                        // Key problems are ours, not the caller's
                        Some(e @ Error::Internal { .. }) => e,
                        _ => Error::Unauthenticated { message: None },
                    });
                }
            },
        };

        let memberships = state.store.memberships(claims.sub).await?;
        debug!(user_id = %claims.sub, groups = memberships.len(), "Authenticated caller");

        Ok(CurrentUser {
            id: claims.sub,
            username: claims.username,
            role: claims.role,
            memberships,
        })
    }
}
