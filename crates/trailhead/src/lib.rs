//! # Trailhead
//!
//! Backend of a campsite booking platform. This crate assembles the
//! workspace into a runnable application:
//!
//! - [`App`] - Maps [`TrailheadConfig`](trailhead_config::TrailheadConfig)
//!   onto the pipeline, telemetry and server settings
//! - [`routes`] - Demo business routes behind the pipeline's dispatcher
//! - The `trailhead` binary - `serve` and `check-config` commands
//!
//! ## Request flow
//!
//! ```text
//! hyper → /health, /metrics
//!       → RequestLog → CookieParser → JsonBody → Cors* → ResourcePolicy → Csrf
//!       → RouteTable (/api/csrf/restore, /api/users, /api/users/{userId}/bookings)
//!       → NotFound → ErrorClassifier → ErrorResponder
//! ```
//!
//! ```rust,ignore
//! use trailhead::App;
//! use trailhead_config::ConfigLoader;
//! use trailhead_server::ShutdownSignal;
//!
//! let config = ConfigLoader::new().with_production().with_env_prefix("TRAILHEAD").load()?;
//! let app = App::new(config);
//! let metrics = app.init_telemetry()?;
//! app.into_server()?
//!     .with_metrics(metrics)
//!     .run_with_shutdown(ShutdownSignal::with_os_signals())
//!     .await?;
//! ```

#![doc(html_root_url = "https://docs.rs/trailhead/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;
mod error;
pub mod routes;

pub use app::{App, AppState};
pub use error::StartupError;

pub use trailhead_bookings as bookings;
pub use trailhead_config as config;
pub use trailhead_core as core;
pub use trailhead_middleware as middleware;
pub use trailhead_server as server;
pub use trailhead_store as store;
pub use trailhead_telemetry as telemetry;
