//! Typed configuration for the Trailhead booking API.
//!
//! - TOML and JSON files
//! - `.env` files via `dotenvy`
//! - `TRAILHEAD__SECTION__KEY` environment overrides
//! - Strict parsing: unknown fields are errors
//!
//! # Example
//!
//! ```no_run
//! use trailhead_config::ConfigLoader;
//!
//! # fn main() -> Result<(), trailhead_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("trailhead.toml")?
//!     .with_dotenv()?
//!     .with_env_prefix("TRAILHEAD")
//!     .load()?;
//!
//! println!("listening on {}", config.server.http_addr);
//! # Ok(())
//! # }
//! ```
//!
//! # File format
//!
//! ```toml
//! environment = "production"
//!
//! [server]
//! http_addr = "0.0.0.0:5000"
//! shutdown_timeout_secs = 30
//! request_timeout_ms = 30000
//! max_body_bytes = 1048576
//!
//! [security]
//! csrf_cookie_name = "_csrf"
//! csrf_header_names = ["csrf-token", "xsrf-token", "x-csrf-token", "x-xsrf-token"]
//! cookie_path = "/"
//!
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [metrics]
//! enabled = true
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::TrailheadConfig;
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::{LogFormat, LoggingConfig, MetricsSection, SecurityConfig, ServerConfig};
