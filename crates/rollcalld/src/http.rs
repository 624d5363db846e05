//! HTTP surface: JSON routes over [`RegistryService`].

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::{RegistryError, RegistryResult};
use crate::models::{
    IdentifyResponse, IdentifyUser, MessageResponse, RegisterUser, SearchQuery, SearchResponse,
    UserProfile, UserSummary,
};
use crate::service::RegistryService;
use crate::store::RecordStore;

type SharedService<S> = Arc<RegistryService<S>>;

/// Routes only, without middleware.
pub fn router<S: RecordStore>(service: RegistryService<S>) -> Router {
    Router::new()
        .route("/register-user", post(register_user::<S>))
        .route("/identify-user", post(identify_user::<S>))
        .route("/search-user", get(search_user::<S>))
        .route("/status", get(status::<S>))
        .with_state(Arc::new(service))
}

/// The full application: routes plus CORS, request tracing and body limit.
///
/// The limit is enforced by the JSON extractor, so an oversized body is
/// reported as a structured validation error.
pub fn app<S: RecordStore>(service: RegistryService<S>, config: &Config) -> Router {
    router(service)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

async fn register_user<S: RecordStore>(
    State(service): State<SharedService<S>>,
    payload: Result<Json<RegisterUser>, JsonRejection>,
) -> RegistryResult<impl IntoResponse> {
    let Json(input) = payload.map_err(|e| RegistryError::Validation(e.body_text()))?;
    service.register(input).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            success: true,
            message: "User registered successfully.".into(),
        }),
    ))
}

async fn identify_user<S: RecordStore>(
    State(service): State<SharedService<S>>,
    payload: Result<Json<IdentifyUser>, JsonRejection>,
) -> RegistryResult<Json<IdentifyResponse>> {
    let Json(input) = payload.map_err(|e| RegistryError::Validation(e.body_text()))?;

    let response = match service.identify(input).await? {
        Some(record) => IdentifyResponse {
            success: true,
            message: "User identified successfully.".into(),
            user: Some(UserProfile::from(&record)),
        },
        None => IdentifyResponse {
            success: false,
            message: "No matching user found.".into(),
            user: None,
        },
    };
    Ok(Json(response))
}

async fn search_user<S: RecordStore>(
    State(service): State<SharedService<S>>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> RegistryResult<Json<SearchResponse>> {
    let Query(query) = query.map_err(|e| RegistryError::Validation(e.body_text()))?;
    let users = service.search(query).await?;

    Ok(Json(SearchResponse {
        success: true,
        users: users.iter().map(UserSummary::from).collect(),
    }))
}

async fn status<S: RecordStore>(State(service): State<SharedService<S>>) -> impl IntoResponse {
    service.status().await.map(Json)
}
