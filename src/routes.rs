use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::Html,
    routing::get,
    Json, Router,
};
use log::info;

use crate::calendar::NonWorkingDays;
use crate::config::{ReportConfig, ReportQuery, Settings};
use crate::error::Result;
use crate::html::{HtmlPage, TimeSheetPresenter};
use crate::report::{create_time_sheet, TimeSheet};
use crate::source::EntrySource;

/// リクエスト間で共有する読み取り専用の状態。
pub struct AppState {
    pub settings: Settings,
    pub calendar: Box<dyn NonWorkingDays>,
    pub http: reqwest::Client,
}

/// `/current`と`/timesheet`のルーターを返す。
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/current", get(current))
        .route("/timesheet", get(timesheet))
        .with_state(state)
}

/// タイムシートをHTMLで返す。
async fn current(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportQuery>,
) -> Result<Html<String>> {
    info!("GET /current {:?}", query);
    let (config, time_sheet) = read_time_sheet(&state, &query).await?;

    let mut body = String::new();
    HtmlPage::new(&mut body, config.timezone).show_time_sheet(&time_sheet)?;

    Ok(Html(body))
}

/// タイムシートをJSONで返す。
async fn timesheet(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<TimeSheet>> {
    info!("GET /timesheet {:?}", query);
    let (_, time_sheet) = read_time_sheet(&state, &query).await?;

    Ok(Json(time_sheet))
}

async fn read_time_sheet(state: &AppState, query: &ReportQuery) -> Result<(ReportConfig, TimeSheet)> {
    let config = ReportConfig::new(query, &state.settings)?;
    let source = EntrySource::from_settings(&state.settings, &state.http)?;
    let time_sheet = create_time_sheet(&source, &config, state.calendar.as_ref()).await?;

    Ok((config, time_sheet))
}
