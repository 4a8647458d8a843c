use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{ErrorResponse, Result, VerseError};
use crate::health::HealthChecker;
use crate::query::QueryEngine;
use crate::rate_limiter::{LocalWindows, RateGovernor};
use crate::redis::RedisWindows;
use crate::store::VerseStore;
use crate::validation::RequestValidator;
use crate::verse::Verse;

/// Shared application state
pub type SharedState = Arc<AppState>;

/// Application state: the query engine and the rate governor in front of it
pub struct AppState {
    pub queries: QueryEngine,
    pub governor: RateGovernor,
    /// Present when rate windows are kept in process and need sweeping.
    pub local_windows: Option<LocalWindows>,
}

impl AppState {
    pub fn new(store: Arc<VerseStore>, windows: LocalWindows) -> Self {
        Self {
            queries: QueryEngine::new(store),
            governor: RateGovernor::new(Arc::new(windows.clone())),
            local_windows: Some(windows),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let store = Arc::new(VerseStore::from_file(
            config.data_path.clone(),
            config.retry_policy(),
        ));

        if config.uses_redis() {
            let windows = RedisWindows::new(&config.redis_url)?;
            Ok(Self {
                queries: QueryEngine::new(store),
                governor: RateGovernor::new(Arc::new(windows)),
                local_windows: None,
            })
        } else {
            Ok(Self::new(store, LocalWindows::new()))
        }
    }
}

/// Parameters of `GET /verses`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct VerseQuery {
    pub q: Option<String>,
    pub chapter: Option<String>,
    pub verse: Option<String>,
}

impl VerseQuery {
    /// Collect the known parameters from raw query pairs.
    ///
    /// `chapter` and `verse` keep their first value. A `q` given more than once
    /// is not a search string and is ignored.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = Self::default();
        let mut q_seen = 0;
        for (key, value) in pairs {
            match key.as_str() {
                "q" => {
                    q_seen += 1;
                    query.q = (q_seen == 1).then_some(value);
                }
                "chapter" if query.chapter.is_none() => query.chapter = Some(value),
                "verse" if query.verse.is_none() => query.verse = Some(value),
                _ => {}
            }
        }
        query
    }
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: usize,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// `GET /verses`: search with `q`, look up with `chapter` and `verse`, or list.
pub async fn list_verses(
    State(state): State<SharedState>,
    query: std::result::Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<Vec<Verse>>> {
    let Query(pairs) =
        query.map_err(|_| VerseError::Validation("Invalid query parameters".to_string()))?;
    let params = VerseQuery::from_pairs(pairs);

    if let Some(q) = non_empty(&params.q) {
        return Ok(Json(state.queries.search(q)?));
    }

    if let (Some(chapter), Some(verse)) = (non_empty(&params.chapter), non_empty(&params.verse)) {
        let pair = RequestValidator::parse_chapter_verse(chapter, verse)?;
        let found = state
            .queries
            .lookup_by_chapter_verse(pair.chapter, pair.verse)?;
        return Ok(Json(vec![found]));
    }

    Ok(Json(state.queries.list_page()))
}

/// `GET /verses/count`
pub async fn count_verses(State(state): State<SharedState>) -> Json<CountResponse> {
    Json(CountResponse {
        count: state.queries.count(),
    })
}

/// `GET /verses/random`
pub async fn random_verse(State(state): State<SharedState>) -> Result<Json<Verse>> {
    Ok(Json(state.queries.pick_random()?))
}

fn verse_id(path: std::result::Result<Path<String>, PathRejection>) -> Result<String> {
    let Path(id) = path.map_err(|_| VerseError::Validation("Invalid verse ID".to_string()))?;
    RequestValidator::validate_verse_id(&id)?;
    Ok(id)
}

/// `GET /verses/next/:id`
pub async fn next_verse(
    State(state): State<SharedState>,
    path: std::result::Result<Path<String>, PathRejection>,
) -> Result<Json<Verse>> {
    let id = verse_id(path)?;
    Ok(Json(state.queries.next(&id)?))
}

/// `GET /verses/previous/:id`
pub async fn previous_verse(
    State(state): State<SharedState>,
    path: std::result::Result<Path<String>, PathRejection>,
) -> Result<Json<Verse>> {
    let id = verse_id(path)?;
    Ok(Json(state.queries.previous(&id)?))
}

/// Navigation route hit without an id.
pub async fn missing_verse_id() -> VerseError {
    VerseError::Validation("Invalid verse ID".to_string())
}

/// Any method other than GET on a verse route.
pub async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "GET")],
        Json(ErrorResponse::new("Method not allowed")),
    )
}

/// Any path no route matches.
pub async fn not_found() -> VerseError {
    VerseError::NotFound("Not found".to_string())
}

/// Health check endpoint
pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    Json(HealthChecker::new(&state.queries, &state.governor).check_health())
}
