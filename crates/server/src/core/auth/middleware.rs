use crate::config::AppState;
use crate::core::ctx::Ctx;
use crate::core::error::{Error, Result};
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

/// Resolve the bearer token, if any, into a [`Ctx`] request extension.
///
/// Requests without a usable session pass through unauthenticated; handlers
/// that need a subject extract `Ctx` and reject with 401 themselves.
pub async fn mw_ctx_resolver(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    debug!("MIDDLEWARE: ctx_resolver");

    let auth_header = match req.headers().get(header::AUTHORIZATION) {
        Some(h) => Some(h.to_str().map_err(|_| Error::AuthFailTokenWrongFormat)?),
        None => None,
    };

    // Format: "Bearer <token>"
    let token = match auth_header {
        Some(h) => Some(
            h.strip_prefix("Bearer ")
                .ok_or(Error::AuthFailTokenWrongFormat)?
                .to_string(),
        ),
        None => None,
    };

    if let Some(token) = token {
        match state.sessions.resolve(&token).await {
            Ok(Some(user_id)) => {
                req.extensions_mut().insert(Ctx::new(user_id));
            }
            Ok(None) => debug!("Bearer token did not resolve to a session"),
            Err(e) => {
                warn!("Session lookup failed: {}", e);
                return Err(Error::Internal(e.to_string()));
            }
        }
    }

    Ok(next.run(req).await)
}
