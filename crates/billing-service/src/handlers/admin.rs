//! Operator endpoints.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use billing_core::SweepRunId;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::lifecycle::SweepReport;
use crate::state::AppState;

/// Query parameters for a manual sweep.
#[derive(Debug, Default, Deserialize)]
pub struct SweepQuery {
    /// Resume this run instead of starting a new one. Owners it already
    /// reconciled are skipped.
    pub run_id: Option<String>,
}

/// Run a sweep now and return its report.
pub async fn run_sweep(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Query(query): Query<SweepQuery>,
) -> Result<Json<SweepReport>, ApiError> {
    let run = match query.run_id.as_deref() {
        Some(raw) => raw
            .parse::<SweepRunId>()
            .map_err(|_| ApiError::BadRequest(format!("invalid run id: {raw}")))?,
        None => SweepRunId::generate(),
    };
    tracing::info!(
        run_id = %run,
        resumed = query.run_id.is_some(),
        service = %auth.service_name,
        "Manual billing sweep requested"
    );

    let report = state.engine.sweep(run, None).await?;
    Ok(Json(report))
}
