//! # Axum Helpers
//!
//! Shared plumbing for the HTTP services in this workspace.
//!
//! - **[`server`]**: Router assembly, health checks, graceful shutdown
//! - **[`errors`]**: Structured error responses with error codes

pub mod errors;
pub mod server;

pub use server::{
    AppInfo, HealthCheckFuture, HealthResponse, OPENAPI_PATH, ShutdownCoordinator,
    create_production_app, create_router, health_router, run_health_checks, shutdown_signal,
    with_common_layers,
};

pub use errors::{AppError, ErrorCode, ErrorResponse};
