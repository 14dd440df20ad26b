//! Adjudication preview, interaction screening and eligibility diagnostics

use axum::{extract::{Path, State}, Extension, Json};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{ConditionId, EmployeeId, ItemId};
use domain_pricing::{EligibilityFilter, InteractionScreener};

use crate::auth::{permissions, require, Claims};
use crate::dto::adjudication::*;
use crate::{AppState, error::ApiError};

/// Prices lines against a simulated ceiling; nothing is written
pub async fn preview(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<PreviewRequest>,
) -> Result<Json<AdjudicationResponse>, ApiError> {
    require(&claims, permissions::ADJUDICATION_PREVIEW)?;
    request.validate()?;

    let service_date = request.service_date.unwrap_or_else(|| state.today());
    let result = state
        .service
        .preview(
            EmployeeId::from(request.employee_id),
            service_date,
            to_lines(&request.lines),
            &claims.sub,
        )
        .await?;
    Ok(Json(result.into()))
}

/// Reports interactions among a set of items
pub async fn screen_interactions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<ScreenRequest>,
) -> Result<Json<ScreenResponse>, ApiError> {
    require(&claims, permissions::ADJUDICATION_PREVIEW)?;
    request.validate()?;

    let item_ids: Vec<ItemId> = request.item_ids.iter().copied().map(ItemId::from).collect();
    let interactions = state.ports.catalog.interactions_among(&item_ids).await?;
    let alerts = InteractionScreener::screen(&item_ids, &interactions);
    let requires_review = alerts.iter().any(|a| a.requires_review);
    Ok(Json(ScreenResponse { alerts, requires_review }))
}

/// Lists every eligibility check a condition fails for an employee
pub async fn condition_eligibility(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(request): Json<EligibilityRequest>,
) -> Result<Json<EligibilityResponse>, ApiError> {
    require(&claims, permissions::CONDITION_READ)?;

    let condition = state.ports.catalog.get_condition(ConditionId::from(id)).await?;
    let employee = state
        .ports
        .employees
        .employee_context(EmployeeId::from(request.employee_id))
        .await?;
    let service_date = request.service_date.unwrap_or_else(|| state.today());

    let report = EligibilityFilter::evaluate_all(&condition, &employee, service_date);
    Ok(Json(EligibilityResponse {
        condition_id: id,
        condition_name: condition.name,
        service_date,
        eligible: report.is_eligible(),
        failures: report.failures.into_iter().map(FailureResponse::from).collect(),
    }))
}
