//! Per-owner billing handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use billing_core::{BillingInterval, BillingRecord, Plan, PlanTier};

use super::parse_owner;
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::gateway::Card;
use crate::lifecycle::{BillingHistoryEntry, ConversionReceipt, PlanSummary};
use crate::state::AppState;

/// Start the free trial.
pub async fn start_trial(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(owner_id): Path<String>,
) -> Result<(StatusCode, Json<BillingRecord>), ApiError> {
    let owner = parse_owner(&owner_id)?;
    let record = state.engine.start_trial(&owner, Plan::Free).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Get the billing record.
pub async fn get_billing(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(owner_id): Path<String>,
) -> Result<Json<BillingRecord>, ApiError> {
    let owner = parse_owner(&owner_id)?;
    Ok(Json(state.engine.billing(&owner)?))
}

/// Get the plan summary.
pub async fn get_plan(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(owner_id): Path<String>,
) -> Result<Json<PlanSummary>, ApiError> {
    let owner = parse_owner(&owner_id)?;
    Ok(Json(state.engine.plan_details(&owner)?))
}

/// Subscribe request.
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    /// Plan label or provider code.
    pub plan: String,
    /// "monthly" or "annually".
    pub duration: String,
    /// Optional coupon code.
    #[serde(default)]
    pub coupon: Option<String>,
}

/// Convert to (or switch) a paid plan.
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(owner_id): Path<String>,
    Json(req): Json<SubscribeRequest>,
) -> Result<Json<ConversionReceipt>, ApiError> {
    let owner = parse_owner(&owner_id)?;
    let tier: PlanTier = req.plan.parse()?;
    let interval: BillingInterval = req.duration.parse()?;

    let receipt = state
        .engine
        .convert_to_paid(&owner, tier, interval, req.coupon.as_deref())
        .await?;
    Ok(Json(receipt))
}

/// Preview query parameters.
#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    /// Target plan.
    pub plan: String,
    /// Target interval.
    pub duration: String,
}

/// Preview response.
#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    /// Cost delta in cents.
    pub amount_cents: i64,
    /// Cost delta formatted as dollars.
    pub amount_formatted: String,
}

/// Preview the cost of switching plans.
pub async fn preview_switch(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(owner_id): Path<String>,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let owner = parse_owner(&owner_id)?;
    let tier: PlanTier = query.plan.parse()?;
    let interval: BillingInterval = query.duration.parse()?;

    let amount_cents = state.engine.preview_switch(&owner, interval, tier).await?;
    Ok(Json(PreviewResponse {
        amount_cents,
        amount_formatted: format_cents(amount_cents),
    }))
}

/// Cancel the paid subscription.
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(owner_id): Path<String>,
) -> Result<Json<BillingRecord>, ApiError> {
    let owner = parse_owner(&owner_id)?;
    Ok(Json(state.engine.cancel(&owner).await?))
}

/// Cards response.
#[derive(Debug, Serialize)]
pub struct CardsResponse {
    /// Cards on file.
    pub cards: Vec<Card>,
}

/// List cards on file.
pub async fn list_cards(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(owner_id): Path<String>,
) -> Result<Json<CardsResponse>, ApiError> {
    let owner = parse_owner(&owner_id)?;
    let cards = state.engine.cards(&owner).await?;
    Ok(Json(CardsResponse { cards }))
}

/// Add card request.
#[derive(Debug, Deserialize)]
pub struct AddCardRequest {
    /// Tokenised payment method from the provider's client library.
    pub token: String,
}

/// Attach a payment method.
pub async fn add_card(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(owner_id): Path<String>,
    Json(req): Json<AddCardRequest>,
) -> Result<Json<BillingRecord>, ApiError> {
    let owner = parse_owner(&owner_id)?;
    Ok(Json(
        state.engine.add_payment_method(&owner, &req.token).await?,
    ))
}

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Balance in cents.
    pub balance_cents: i64,
    /// Balance formatted as dollars.
    pub balance_formatted: String,
}

/// Get the provider-side customer balance.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(owner_id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let owner = parse_owner(&owner_id)?;
    let balance_cents = state.engine.balance(&owner).await?;
    Ok(Json(BalanceResponse {
        balance_cents,
        balance_formatted: format_cents(balance_cents),
    }))
}

/// History response.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Past charges.
    pub charges: Vec<BillingHistoryEntry>,
}

/// List past charges.
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(owner_id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let owner = parse_owner(&owner_id)?;
    let charges = state.engine.billing_history(&owner).await?;
    Ok(Json(HistoryResponse { charges }))
}

/// Trial feedback request.
#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    /// Why the user did not buy.
    #[serde(default)]
    pub reason: Option<String>,
    /// Free-text feedback.
    #[serde(default)]
    pub feedback: Option<String>,
}

/// Record post-trial feedback.
pub async fn record_feedback(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(owner_id): Path<String>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<BillingRecord>, ApiError> {
    let owner = parse_owner(&owner_id)?;
    let record = state
        .engine
        .record_trial_feedback(&owner, req.reason, req.feedback)
        .await?;
    Ok(Json(record))
}

fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}${}.{:02}", abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cents_are_formatted_as_dollars() {
        assert_eq!(format_cents(1899), "$18.99");
        assert_eq!(format_cents(5), "$0.05");
        assert_eq!(format_cents(-250), "-$2.50");
        assert_eq!(format_cents(0), "$0.00");
    }
}
