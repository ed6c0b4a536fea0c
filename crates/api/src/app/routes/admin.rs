//! Operational endpoints.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use spicecart_auth::Permission;

use crate::app::{errors, services::AppServices};
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/read-models/rebuild", post(rebuild_read_models))
}

/// Replay the full event log into fresh read models.
pub async fn rebuild_read_models(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(res) = authz::require(&principal, &Permission::READ_MODELS_REBUILD) {
        return res;
    }

    match services.rebuild_read_models().await {
        Ok(replayed) => {
            tracing::info!(
                replayed,
                principal_id = %principal.principal_id(),
                "read models rebuilt on request"
            );
            let body = serde_json::json!({ "events_replayed": replayed });
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "read model rebuild failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}
