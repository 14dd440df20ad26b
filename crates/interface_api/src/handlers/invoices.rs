//! Invoice handlers

use axum::{extract::{Path, State}, http::StatusCode, Extension, Json};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{EmployeeId, InvoiceId};

use crate::auth::{permissions, require, Claims};
use crate::dto::adjudication::to_lines;
use crate::dto::invoice::*;
use crate::{AppState, error::ApiError};

/// Creates a draft invoice
pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), ApiError> {
    require(&claims, permissions::INVOICE_WRITE)?;
    request.validate()?;

    let service_date = request.service_date.unwrap_or_else(|| state.today());
    let invoice = state
        .service
        .create_draft(EmployeeId::from(request.employee_id), service_date, to_lines(&request.lines))
        .await?;
    Ok((StatusCode::CREATED, Json(InvoiceResponse::from(&invoice))))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    require(&claims, permissions::INVOICE_READ)?;
    let invoice = state.service.get(InvoiceId::from(id)).await?;
    Ok(Json(InvoiceResponse::from(&invoice)))
}

/// Adjudicates the invoice and debits the ceiling; repeatable until submitted
pub async fn calculate_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<CalculationResponse>, ApiError> {
    require(&claims, permissions::INVOICE_WRITE)?;
    let (invoice, result) = state.service.calculate(InvoiceId::from(id), &claims.sub).await?;
    Ok(Json(CalculationResponse {
        invoice: InvoiceResponse::from(&invoice),
        adjudication: result.into(),
    }))
}

pub async fn submit_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    require(&claims, permissions::INVOICE_WRITE)?;
    let invoice = state.service.submit(InvoiceId::from(id), &claims.sub).await?;
    Ok(Json(InvoiceResponse::from(&invoice)))
}

pub async fn approve_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    require(&claims, permissions::INVOICE_APPROVE)?;
    request.validate()?;
    let invoice = state
        .service
        .approve(InvoiceId::from(id), &claims.sub, request.note)
        .await?;
    Ok(Json(InvoiceResponse::from(&invoice)))
}

/// Rejects a submitted invoice and credits its ceiling debits back
pub async fn reject_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    require(&claims, permissions::INVOICE_APPROVE)?;
    request.validate()?;
    let invoice = state
        .service
        .reject(InvoiceId::from(id), &claims.sub, request.note)
        .await?;
    Ok(Json(InvoiceResponse::from(&invoice)))
}

pub async fn cancel_invoice(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<InvoiceResponse>, ApiError> {
    require(&claims, permissions::INVOICE_WRITE)?;
    request.validate()?;
    let invoice = state
        .service
        .cancel(InvoiceId::from(id), &claims.sub, request.note)
        .await?;
    Ok(Json(InvoiceResponse::from(&invoice)))
}
