/// Goal dashboard endpoint
///
/// # Endpoint
///
/// ```text
/// GET /dashboard/metas?regional=Norte&from=2024-01-01&to=2024-12-31
/// ```
///
/// Goals, activities and institution counts are fetched concurrently and
/// combined by [`regionalops_shared::dashboard::summarize`]. Regional names
/// are compared after normalization and `REGIONAL_ALIASES`, so "Região
/// Norte" and "norte" land in the same roll-up.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::QueryParams,
    response::ApiResponse,
};
use axum::{extract::State, Extension};
use chrono::NaiveDate;
use regionalops_shared::{
    auth::{authorization::scoped_regional, middleware::AuthContext},
    dashboard::{summarize, DashboardSummary},
    models::{
        activity::{Activity, ActivityFilter},
        goal::{Goal, GoalFilter},
        instituicao::Instituicao,
    },
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub regional: Option<String>,

    /// Only count activities on or after this day
    pub from: Option<NaiveDate>,

    /// Only count activities on or before this day
    pub to: Option<NaiveDate>,
}

/// Goal progress and per-regional roll-ups
pub async fn goal_dashboard(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    QueryParams(query): QueryParams<DashboardQuery>,
) -> ApiResult<ApiResponse<DashboardSummary>> {
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(ApiError::invalid_field("from", "'from' must not be after 'to'"));
        }
    }

    let regional = scoped_regional(&auth, query.regional.as_deref())?;

    let db = &state.supabase;
    let scope = auth.scope();

    // Spelling varies between tables; filter after normalization instead
    let activity_filter = ActivityFilter {
        from: query.from,
        to: query.to,
        ..Default::default()
    };

    let goal_filter = GoalFilter::default();
    let (goals, activities, stats) = tokio::try_join!(
        Goal::list(db, &scope, &goal_filter),
        Activity::list(db, &scope, &activity_filter),
        Instituicao::stats(db, &scope, None),
    )?;

    let summary = summarize(
        &goals,
        &activities,
        &stats,
        &state.config.dashboard.regional_aliases,
        regional.as_deref(),
    );

    tracing::debug!(
        regional = ?regional,
        goals = summary.total_goals,
        activities = activities.len(),
        "Dashboard computed"
    );

    Ok(ApiResponse::success(summary))
}
