//! Authentication and authorization middleware.
//!
//! `authenticate` runs the gate and stores its [`GateOutcome`] in request
//! extensions; `authorize` applies the path policy and, on success, installs
//! the [`AuthenticatedPrincipal`] for handlers. A bad token is 401 from the
//! gate; everything the policy rejects is 403.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use mealbridge_core::auth::AuthError;
use mealbridge_core::auth::gate::{AuthenticatedPrincipal, GateOutcome};
use mealbridge_core::auth::policy::{Decision, DenyReason};

use crate::AppState;
use crate::error::AppError;

/// Axum middleware: validates a bearer token when one is presented and
/// records who (if anyone) is making the request.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = request.uri().path().to_owned();
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .map(|v| v.to_str().unwrap_or_default().to_owned());

    let outcome = state
        .gate
        .authenticate(&path, header.as_deref())
        .await
        .map_err(AuthError::from)?;

    request.extensions_mut().insert(outcome);
    Ok(next.run(request).await)
}

/// Axum middleware: first-match-wins path authorization. Public paths pass
/// straight through.
pub async fn authorize(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let outcome = request
        .extensions()
        .get::<GateOutcome>()
        .cloned()
        .unwrap_or(GateOutcome::Anonymous);

    let principal = match outcome {
        GateOutcome::Public => return Ok(next.run(request).await),
        GateOutcome::Anonymous => None,
        GateOutcome::Authenticated(p) => Some(p),
    };

    let path = request.uri().path();
    match state.policy.decide(path, principal.as_ref()) {
        Decision::Allow => {
            if let Some(p) = principal {
                request.extensions_mut().insert::<AuthenticatedPrincipal>(p);
            }
            Ok(next.run(request).await)
        }
        Decision::Deny(reason) => {
            debug!(path, ?reason, "request denied by policy");
            let message = match reason {
                DenyReason::Anonymous => "Authentication required",
                DenyReason::InsufficientAuthority => "Insufficient authority",
                DenyReason::DenyRule => "Access denied",
            };
            Err(AppError::Forbidden(message.into()))
        }
    }
}
