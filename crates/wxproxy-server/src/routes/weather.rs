use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use wxproxy_core::AppError;
use wxproxy_weather::WeatherSnapshot;

use crate::error::ApiError;
use crate::request_id::RequestId;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WeatherQuery {
    // optional here so a missing parameter reaches validation and gets a 422
    pub city: Option<String>,
}

/// `GET /weather?city={name}`
pub async fn get_weather(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    query: Result<Query<WeatherQuery>, QueryRejection>,
) -> Result<Json<WeatherSnapshot>, ApiError> {
    let city = match query {
        Ok(Query(query)) => query.city.unwrap_or_default(),
        Err(rejection) => {
            return Err(ApiError::new(
                AppError::Validation(rejection.body_text()),
                request_id,
            ))
        }
    };

    match state.weather.get_weather(&city).await {
        Ok(snapshot) => {
            state.metrics.record_cache_lookup(snapshot.cached);
            Ok(Json(snapshot))
        }
        Err(e) => {
            // anything past validation missed the cache first
            if !matches!(e, AppError::Validation(_)) {
                state.metrics.record_cache_lookup(false);
            }
            Err(ApiError::new(e, request_id))
        }
    }
}
