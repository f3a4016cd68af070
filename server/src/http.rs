use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{self, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
};
use platform_api::{ApiError, ApiResult, parse_json};
use products_hr::{EmpId, Employee, EmployeeKey, EmployeeStore, StoreError};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<EmployeeStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let store = EmployeeStore::new(config.store.clone());
        Self {
            store: Arc::new(store),
            config: Arc::new(config),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let data_file = state.store.path().display().to_string();
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, %data_file, "employee server listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    let allow_origin = if allowed.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed)
    };
    CorsLayer::new()
        .allow_headers([http::header::CONTENT_TYPE])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_origin(allow_origin)
}

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/health", get(health_handler))
        .route("/employees", any(collection_handler))
        .route("/employees/{emp_id}", any(member_handler))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(SetResponseHeaderLayer::if_not_present(
                    http::header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                ))
                .layer(cors_layer(&state.config.cors_allowed_origins)),
        )
        .with_state(state)
}

/// `/employees`: the key of PUT and DELETE travels in the body.
async fn collection_handler(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> ApiResult<Response> {
    if method == Method::OPTIONS {
        return Ok(StatusCode::OK.into_response());
    }
    ensure_storage(&state).await?;
    match method {
        Method::GET => {
            let employees = state.store.list().await.map_err(store_error)?;
            Ok(Json(employees).into_response())
        }
        Method::POST => {
            let employee: Employee = parse_json(&body)?;
            create_employee(&state, employee).await
        }
        Method::PUT => {
            let employee: Employee = parse_json(&body)?;
            replace_employee(&state, employee.emp_id, employee).await
        }
        Method::DELETE => {
            let key: EmployeeKey = parse_json(&body)?;
            delete_employee(&state, key.emp_id).await
        }
        _ => Err(ApiError::UnsupportedMethod),
    }
}

/// `/employees/{emp_id}`: the key travels in the path.
async fn member_handler(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    method: Method,
    body: Bytes,
) -> ApiResult<Response> {
    if method == Method::OPTIONS {
        return Ok(StatusCode::OK.into_response());
    }
    ensure_storage(&state).await?;
    let emp_id = parse_emp_id(&raw_id)?;
    match method {
        Method::GET => {
            let employee = state
                .store
                .get(emp_id)
                .await
                .map_err(store_error)?
                .ok_or_else(|| not_found(emp_id))?;
            Ok(Json(employee).into_response())
        }
        Method::PUT => {
            let employee: Employee = parse_json(&body)?;
            if employee.emp_id != emp_id {
                return Err(ApiError::InvalidInput(format!(
                    "empId {} does not match path id {}",
                    employee.emp_id, emp_id
                )));
            }
            replace_employee(&state, emp_id, employee).await
        }
        Method::DELETE => delete_employee(&state, emp_id).await,
        _ => Err(ApiError::UnsupportedMethod),
    }
}

async fn create_employee(state: &AppState, employee: Employee) -> ApiResult<Response> {
    let created = state.store.create(employee).await.map_err(store_error)?;
    info!(emp_id = created.emp_id, "employee created");
    Ok(Json(created).into_response())
}

async fn replace_employee(
    state: &AppState,
    emp_id: EmpId,
    employee: Employee,
) -> ApiResult<Response> {
    let replaced = state
        .store
        .replace(emp_id, employee)
        .await
        .map_err(store_error)?;
    if replaced.matched == 0 && state.config.strict_replace {
        return Err(not_found(emp_id));
    }
    info!(emp_id, matched = replaced.matched, "employee replaced");
    Ok(Json(replaced.employee).into_response())
}

async fn delete_employee(state: &AppState, emp_id: EmpId) -> ApiResult<Response> {
    let removed = state.store.delete(emp_id).await.map_err(store_error)?;
    info!(emp_id, removed, "employee deleted");
    Ok(Json(StatusBody { status: "Deleted" }).into_response())
}

async fn ensure_storage(state: &AppState) -> ApiResult<()> {
    state.store.ensure_available().await.map_err(store_error)
}

fn parse_emp_id(raw: &str) -> ApiResult<EmpId> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::InvalidInput(format!("invalid employee id {raw:?}")))
}

fn not_found(emp_id: EmpId) -> ApiError {
    ApiError::NotFound(format!("Employee {emp_id} not found"))
}

fn store_error(err: StoreError) -> ApiError {
    match err {
        StoreError::StorageUnavailable { .. } => ApiError::StorageUnavailable,
        StoreError::DuplicateId(emp_id) => {
            ApiError::Conflict(format!("Employee {emp_id} already exists"))
        }
        other => ApiError::internal(other.into()),
    }
}

#[derive(Serialize)]
struct StatusBody {
    status: &'static str,
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let storage_ok = state.store.ensure_available().await.is_ok();
    Json(HealthResponse {
        ok: storage_ok,
        storage_ok,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    storage_ok: bool,
    version: &'static str,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        signal(SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    ctrl_c.await;

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
}
