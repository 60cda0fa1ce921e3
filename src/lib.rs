//! # PromptHub HTTP surface
//!
//! JSON-over-HTTP API for the prompt-management service.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, status mapping)
//!
//! All domain logic lives in `prompthub-core`; handlers validate the
//! payload shape, call into the injected repository/index and format the
//! result.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use prompthub_core::{
    HubError, KeyValueStore, MigrationStats, Prompt, PromptInput, PromptRepository, TagIndex,
    TagRecord,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared across handlers.
///
/// The repository and index are constructed once per process and passed
/// explicitly; there is no ambient global.
#[derive(Clone)]
pub struct AppState {
    pub prompts: PromptRepository,
    pub tags: TagIndex,
}

impl AppState {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let tags = TagIndex::new(store.clone());
        let prompts = PromptRepository::new(store, tags.clone());
        Self { prompts, tags }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Serialize, ToSchema)]
pub struct DeleteRes {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct MigrateRes {
    pub success: bool,
    pub stats: MigrationStats,
}

#[derive(Serialize, ToSchema)]
pub struct HealthRes {
    pub status: String,
    pub timestamp: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn error_response(err: HubError) -> ApiError {
    let status = match &err {
        HubError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        HubError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("request failed: {:?}", err);
    }
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        list_prompts,
        create_prompt,
        get_prompt,
        update_prompt,
        delete_prompt,
        list_tags,
        get_tag,
        migrate_tags
    ),
    components(schemas(
        Prompt,
        PromptInput,
        TagRecord,
        MigrationStats,
        ErrorBody,
        DeleteRes,
        MigrateRes,
        HealthRes
    ))
)]
struct ApiDoc;

/// Builds the application router around the given state.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/prompts", get(list_prompts).post(create_prompt))
        .route(
            "/prompts/:id",
            get(get_prompt).put(update_prompt).delete(delete_prompt),
        )
        .route("/tags", get(list_tags))
        .route("/tags/:name", get(get_tag))
        .route("/admin/migrate-tags", post(migrate_tags))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[utoipa::path(
    get,
    path = "/prompts",
    responses(
        (status = 200, description = "All prompt records", body = [Prompt])
    )
)]
async fn list_prompts(State(state): State<AppState>) -> Result<Json<Vec<Prompt>>, ApiError> {
    state.prompts.list().map(Json).map_err(error_response)
}

#[utoipa::path(
    post,
    path = "/prompts",
    request_body = PromptInput,
    responses(
        (status = 201, description = "Prompt created", body = Prompt),
        (status = 400, description = "Missing required fields", body = ErrorBody)
    )
)]
async fn create_prompt(
    State(state): State<AppState>,
    Json(input): Json<PromptInput>,
) -> Result<(StatusCode, Json<Prompt>), ApiError> {
    let prompt = state.prompts.create(input).map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(prompt)))
}

#[utoipa::path(
    get,
    path = "/prompts/{id}",
    params(("id" = String, Path, description = "Prompt id")),
    responses(
        (status = 200, description = "The prompt", body = Prompt),
        (status = 404, description = "Unknown prompt id", body = ErrorBody)
    )
)]
async fn get_prompt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Prompt>, ApiError> {
    state.prompts.get(&id).map(Json).map_err(error_response)
}

#[utoipa::path(
    put,
    path = "/prompts/{id}",
    params(("id" = String, Path, description = "Prompt id")),
    request_body = PromptInput,
    responses(
        (status = 200, description = "Prompt updated", body = Prompt),
        (status = 400, description = "Missing required fields", body = ErrorBody),
        (status = 404, description = "Unknown prompt id", body = ErrorBody)
    )
)]
async fn update_prompt(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<PromptInput>,
) -> Result<Json<Prompt>, ApiError> {
    state
        .prompts
        .update(&id, input)
        .map(Json)
        .map_err(error_response)
}

#[utoipa::path(
    delete,
    path = "/prompts/{id}",
    params(("id" = String, Path, description = "Prompt id")),
    responses(
        (status = 200, description = "Prompt deleted", body = DeleteRes),
        (status = 404, description = "Unknown prompt id", body = ErrorBody)
    )
)]
async fn delete_prompt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteRes>, ApiError> {
    state.prompts.delete(&id).map_err(error_response)?;
    Ok(Json(DeleteRes {
        success: true,
        message: "prompt deleted".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/tags",
    responses(
        (status = 200, description = "All tag records, sorted by count descending", body = [TagRecord])
    )
)]
async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<TagRecord>>, ApiError> {
    state.tags.list_all().map(Json).map_err(error_response)
}

#[utoipa::path(
    get,
    path = "/tags/{name}",
    params(("name" = String, Path, description = "Tag name (case-insensitive)")),
    responses(
        (status = 200, description = "The tag record", body = TagRecord),
        (status = 404, description = "Unknown tag", body = ErrorBody)
    )
)]
async fn get_tag(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<TagRecord>, ApiError> {
    state.tags.get(&name).map(Json).map_err(error_response)
}

#[utoipa::path(
    post,
    path = "/admin/migrate-tags",
    responses(
        (status = 200, description = "Migration summary", body = MigrateRes),
        (status = 500, description = "Listing legacy keys failed", body = ErrorBody)
    )
)]
async fn migrate_tags(State(state): State<AppState>) -> Result<Json<MigrateRes>, ApiError> {
    let stats = state.tags.migrate_legacy_tags().map_err(error_response)?;
    Ok(Json(MigrateRes {
        success: true,
        stats,
    }))
}
