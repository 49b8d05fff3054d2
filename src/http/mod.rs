use axum::{
    Json, Router,
    extract::{Extension, FromRequest, Path, Request},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::error;

use crate::{
    domain::{DomainError, JoinOutcome, Raffle, RaffleId},
    service::{CreateRaffleRequest, FinishRequest, JoinRequest, RaffleService, ServiceError},
    state::StoreError,
};

#[cfg(test)]
mod tests;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

#[derive(Clone)]
pub struct AppState {
    pub service: RaffleService,
}

#[derive(Debug)]
pub struct ApiError {
    code: &'static str,
    message: String,
    status: StatusCode,
    details: Map<String, Value>,
}

impl ApiError {
    fn new(code: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status,
            details: Map::new(),
        }
    }

    fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new("invalid_request", StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", StatusCode::NOT_FOUND, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("forbidden", StatusCode::FORBIDDEN, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("conflict", StatusCode::CONFLICT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal", StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        let message = value.to_string();
        match value {
            DomainError::MissingField { field } => {
                ApiError::invalid_request(message).with_detail("field", field)
            }
            DomainError::InvalidId { .. } | DomainError::InvalidStatus { .. } => {
                ApiError::invalid_request(message)
            }
            DomainError::DuplicateId { id } => ApiError::conflict(message).with_detail("id", id.0),
            DomainError::NotFound { id } => ApiError::not_found(message).with_detail("id", id.0),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        error!(error = %value, "raffle store failure");
        ApiError::internal(value.to_string())
    }
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::Forbidden => ApiError::forbidden(value.to_string()),
            ServiceError::Domain(e) => e.into(),
            ServiceError::Store(e) => e.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    details: Map<String, Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code.to_string(),
                message: self.message,
                details: self.details,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    axum::Json<T>: FromRequest<S>,
    <axum::Json<T> as FromRequest<S>>::Rejection: std::fmt::Display,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = axum::Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ApiError::invalid_request(e.to_string()))?;
        Ok(Self(value))
    }
}

pub fn build_router(service: RaffleService) -> Router {
    let app_state = AppState { service };

    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
        .route("/raffles", get(list_raffles))
        .route("/raffle/create", post(create_raffle))
        .route("/raffle/join", post(join_raffle))
        .route("/raffle/:id", get(get_raffle).delete(delete_raffle))
        .route("/raffle/:id/finish", post(finish_raffle))
        .fallback(fallback_not_found)
        .layer(Extension(app_state))
}

/// Accepts the admin key as `Authorization: Bearer <key>`, falling back to
/// `x-admin-key` when there is no bearer token.
fn extract_admin_key(headers: &HeaderMap) -> Option<String> {
    extract_bearer_token(headers).or_else(|| {
        let raw = headers.get(ADMIN_KEY_HEADER)?;
        raw.to_str().ok().map(|s| s.to_string())
    })
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::AUTHORIZATION)?;
    let raw = raw.to_str().ok()?;
    let raw = raw.strip_prefix("Bearer ")?;
    Some(raw.to_string())
}

fn parse_path_id(raw: &str) -> Result<RaffleId, ApiError> {
    Ok(RaffleId::parse(raw)?)
}

async fn banner() -> &'static str {
    "Raffle server is running"
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": crate::version::VERSION,
    }))
}

async fn list_raffles(
    Extension(state): Extension<AppState>,
) -> Result<Json<Vec<Raffle>>, ApiError> {
    Ok(Json(state.service.list().await?))
}

async fn get_raffle(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Raffle>, ApiError> {
    let id = parse_path_id(&id)?;
    Ok(Json(state.service.get(id).await?))
}

async fn create_raffle(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CreateRaffleRequest>,
) -> Result<Json<Raffle>, ApiError> {
    let key = extract_admin_key(&headers);
    Ok(Json(state.service.create(key.as_deref(), req).await?))
}

async fn join_raffle(
    Extension(state): Extension<AppState>,
    ApiJson(req): ApiJson<JoinRequest>,
) -> Result<Json<JoinOutcome>, ApiError> {
    Ok(Json(state.service.join(req).await?))
}

async fn finish_raffle(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<FinishRequest>,
) -> Result<Json<Raffle>, ApiError> {
    let key = extract_admin_key(&headers);
    let id = parse_path_id(&id)?;
    Ok(Json(state.service.finish(key.as_deref(), id, req).await?))
}

async fn delete_raffle(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Raffle>, ApiError> {
    let key = extract_admin_key(&headers);
    let id = parse_path_id(&id)?;
    Ok(Json(state.service.delete(key.as_deref(), id).await?))
}

async fn fallback_not_found() -> ApiError {
    ApiError::not_found("route not found")
}
