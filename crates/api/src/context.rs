//! Per-request caller resolution.
//!
//! [`resolve_caller`] runs in front of every API route and stores a
//! [`RequestContext`] in the request extensions. Handlers receive it by value
//! as an extractor and decide themselves whether a caller is required.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{AppendHeaders, IntoResponse, Response};
use common::DocumentId;
use doc_store::DocumentStore;
use domain::{Account, DomainError};

use crate::error::ApiError;
use crate::routes::AppState;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Who is calling, as established from the request credentials.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    caller: Option<Account>,
    access_token: Option<String>,
    rejection: Option<String>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(account: Account, access_token: String) -> Self {
        Self {
            caller: Some(account),
            access_token: Some(access_token),
            rejection: None,
        }
    }

    pub fn caller(&self) -> Option<&Account> {
        self.caller.as_ref()
    }

    pub fn caller_id(&self) -> Option<DocumentId> {
        self.caller.as_ref().map(|account| account.id)
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// The caller, or 401 when the request carried no valid credentials.
    pub fn require(&self) -> Result<&Account, ApiError> {
        self.caller.as_ref().ok_or_else(|| {
            ApiError::Unauthorized(
                self.rejection
                    .clone()
                    .unwrap_or_else(|| "Unauthorized request".to_string()),
            )
        })
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Resolves the access token (bearer header first, then cookie) to an
/// account. Invalid tokens leave the request anonymous; only routes that
/// require a caller turn that into 401.
pub async fn resolve_caller<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    mut request: Request,
    next: Next,
) -> Response {
    let context = match access_token(request.headers()) {
        None => RequestContext::anonymous(),
        Some(token) => match state.accounts.authenticate(&token).await {
            Ok(account) => RequestContext::authenticated(account, token),
            Err(DomainError::Unauthorized(message)) => {
                metrics::counter!("auth_rejections_total").increment(1);
                RequestContext {
                    rejection: Some(message),
                    ..RequestContext::anonymous()
                }
            }
            Err(err) => return ApiError::from(err).into_response(),
        },
    };

    request.extensions_mut().insert(context);
    next.run(request).await
}

fn access_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string);
    bearer.or_else(|| cookie(headers, ACCESS_TOKEN_COOKIE))
}

/// Reads one cookie from the `Cookie` headers.
pub fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` headers carrying a fresh token pair.
pub fn token_cookies(
    access_token: &str,
    refresh_token: &str,
) -> AppendHeaders<[(axum::http::HeaderName, String); 2]> {
    AppendHeaders([
        (SET_COOKIE, session_cookie(ACCESS_TOKEN_COOKIE, access_token)),
        (SET_COOKIE, session_cookie(REFRESH_TOKEN_COOKIE, refresh_token)),
    ])
}

/// `Set-Cookie` headers expiring both token cookies.
pub fn cleared_cookies() -> AppendHeaders<[(axum::http::HeaderName, String); 2]> {
    AppendHeaders([
        (SET_COOKIE, format!("{ACCESS_TOKEN_COOKIE}=; {ATTRIBUTES}; Max-Age=0")),
        (SET_COOKIE, format!("{REFRESH_TOKEN_COOKIE}=; {ATTRIBUTES}; Max-Age=0")),
    ])
}

const ATTRIBUTES: &str = "Path=/; HttpOnly; Secure; SameSite=Lax";

fn session_cookie(name: &str, value: &str) -> String {
    format!("{name}={value}; {ATTRIBUTES}")
}
