use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::NaiveDate;
use std::sync::Arc;

use super::{api_error, require_caller, ApiError};
use crate::models::{ApiResponse, CalendarQuery, DayQuery};
use crate::schedule::grid::days_in_month;
use crate::schedule::{annotate, AnnotatedDay, AnnotatedMonthGrid, MonthGrid};
use crate::AppState;

/// GET /api/calendar?year=&month=
///
/// Without parameters returns the month the session is on. An impossible
/// month yields an empty grid and leaves the session where it was.
pub async fn month(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<CalendarQuery>,
) -> Result<Json<ApiResponse<AnnotatedMonthGrid>>, ApiError> {
    let caller = require_caller(&state, &headers)?;
    let mut session = caller.write();
    let (current_year, current_month) = session.month();
    let year = q.year.unwrap_or(current_year);
    let month = q.month.unwrap_or(current_month);

    if days_in_month(year, month).is_none() {
        tracing::warn!("Calendar requested for invalid month {}-{}", year, month);
        let empty = annotate(&MonthGrid::empty(year, month), &[]);
        return Ok(Json(ApiResponse::success(empty)));
    }

    session.set_month(year, month);
    Ok(Json(ApiResponse::success(session.annotated())))
}

/// GET /api/calendar/day?date=YYYY-MM-DD
pub async fn day(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(q): Query<DayQuery>,
) -> Result<Json<ApiResponse<AnnotatedDay>>, ApiError> {
    let caller = require_caller(&state, &headers)?;
    let date = NaiveDate::parse_from_str(q.date.trim(), "%Y-%m-%d")
        .map_err(|_| api_error(StatusCode::BAD_REQUEST, "Fecha inválida"))?;

    let day = caller
        .write()
        .day(date)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Día no encontrado"))?;
    Ok(Json(ApiResponse::success(day)))
}
