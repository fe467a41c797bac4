//! # Trailhead Server
//!
//! Hosts the request pipeline over HTTP/1 with hyper.
//!
//! - [`Server`] - Accept loop, body limit, request timeout, graceful shutdown
//! - [`RouteTable`] - Method + path routing, used as the pipeline's dispatcher
//! - [`HealthCheck`] - `GET /health`, answered before the pipeline
//! - [`ShutdownSignal`] / [`ConnectionTracker`] - Shutdown coordination
//!
//! ```rust,ignore
//! use trailhead_core::DeploymentMode;
//! use trailhead_middleware::{stages::CsrfSettings, Pipeline};
//! use trailhead_server::{RouteTable, Server, ServerSettings};
//!
//! let mode = DeploymentMode::Production;
//! let pipeline = Pipeline::standard(mode, CsrfSettings::for_mode(mode), RouteTable::new());
//! Server::new(pipeline, ServerSettings::default()).run().await?;
//! ```

#![doc(html_root_url = "https://docs.rs/trailhead-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod health;
mod routes;
mod server;
mod shutdown;

pub use error::ServerError;
pub use health::{HealthCheck, HealthStatus};
pub use routes::{PathParams, RouteHandler, RouteTable};
pub use server::{Server, ServerSettings};
pub use shutdown::{ConnectionGuard, ConnectionTracker, ShutdownSignal};
