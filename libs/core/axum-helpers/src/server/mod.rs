//! Server infrastructure: router assembly, health endpoints and graceful shutdown.
//!
//! # Example
//!
//! ```ignore
//! use axum_helpers::server::{create_production_app, create_router, health_router, with_common_layers, AppInfo};
//!
//! let router = create_router::<ApiDoc>(routes.merge(health_router(AppInfo::new("svc", "0.1.0"))));
//! create_production_app(with_common_layers(router), &config, timeout, cleanup).await?;
//! ```

pub mod app;
pub mod health;
pub mod shutdown;

pub use app::{OPENAPI_PATH, create_production_app, create_router, with_common_layers};
pub use health::{AppInfo, HealthCheckFuture, HealthResponse, health_router, run_health_checks};
pub use shutdown::{ShutdownCoordinator, shutdown_signal};
