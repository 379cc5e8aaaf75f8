use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRef, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::{
    adapters::session::SessionService,
    application::error::ApplicationError,
    domain::{config::local::ServerConfig, models::identity::Identity},
};

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
}

/// The authenticated caller, resolved from the bearer token.
pub struct Caller(pub Identity);

impl<S> FromRequestParts<S> for Caller
where
    Arc<SessionService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApplicationError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(Caller(identity.clone()));
        }

        let token = bearer_token(&parts.headers).ok_or(ApplicationError::Unauthorized)?;
        let sessions = Arc::<SessionService>::from_ref(state);
        Ok(Caller(sessions.verify(token)?))
    }
}

/// Last `X-Forwarded-For` hop, the one written by the nearest proxy.
fn forwarded_peer(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .last()
        .map(str::to_string)
}

/// Client address. The socket peer, unless the server sits behind a
/// trusted proxy, in which case the hop that proxy appended.
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    Arc<ServerConfig>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApplicationError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if Arc::<ServerConfig>::from_ref(state).trust_proxy {
            if let Some(ip) = forwarded_peer(&parts.headers) {
                return Ok(ClientIp(ip));
            }
        }

        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| ClientIp(addr.ip().to_string()))
            .ok_or_else(|| {
                ApplicationError::InternalError("Client address unavailable".to_string())
            })
    }
}

/// Rejects any request that does not carry an administrator session.
pub async fn require_admin(
    State(sessions): State<Arc<SessionService>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let identity = match bearer_token(request.headers()) {
        Some(token) => match sessions.verify(token) {
            Ok(identity) => identity,
            Err(e) => return e.into_response(),
        },
        None => {
            warn!("Admin route called without a session");
            return ApplicationError::Unauthorized.into_response();
        }
    };

    if !identity.role().is_admin() {
        warn!("Non-admin {} tried an admin route", identity.username());
        return ApplicationError::Forbidden("Administrator access required".to_string())
            .into_response();
    }

    request.extensions_mut().insert(identity);
    next.run(request).await
}
