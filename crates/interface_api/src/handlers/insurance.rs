//! Ceiling inquiry

use axum::{extract::{Path, State}, Extension, Json};
use uuid::Uuid;

use core_kernel::InsuranceId;

use crate::auth::{permissions, require, Claims};
use crate::dto::insurance::CeilingResponse;
use crate::{AppState, error::ApiError};

pub async fn get_ceiling(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<CeilingResponse>, ApiError> {
    require(&claims, permissions::CEILING_READ)?;
    let balance = state.service.ceiling(InsuranceId::from(id)).await?;
    Ok(Json(balance.into()))
}
