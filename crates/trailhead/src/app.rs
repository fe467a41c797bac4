//! Application assembly: configuration in, server out.
//!
//! [`App`] maps a [`TrailheadConfig`] onto the settings each component
//! understands and wires the demo routes into the standard pipeline.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use trailhead_bookings::{Booking, BookingId, StoreState};
use trailhead_config::{ConfigError, LoggingConfig, MetricsSection, TrailheadConfig};
use trailhead_core::DeploymentMode;
use trailhead_middleware::stages::CsrfSettings;
use trailhead_middleware::Pipeline;
use trailhead_server::{HealthCheck, Server, ServerSettings};
use trailhead_store::{DemoUserSeeder, MemoryUserStore, Seeder, UserStore};
use trailhead_telemetry::{init_logging, init_metrics, LogConfig, LogFormat, MetricsConfig, MetricsRegistry};

use crate::error::StartupError;
use crate::routes::route_table;

/// Shared state behind the demo routes.
#[derive(Clone)]
pub struct AppState {
    users: Arc<dyn UserStore>,
    bookings: Arc<RwLock<BTreeMap<BookingId, Booking>>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Arc::new(MemoryUserStore::new()))
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("users", &self.users.count())
            .field("bookings", &self.bookings.read().len())
            .finish()
    }
}

impl AppState {
    /// State over an existing user store, with no bookings.
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self {
            users,
            bookings: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// The user store.
    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.users
    }

    /// A snapshot of every loaded booking.
    pub fn bookings(&self) -> BTreeMap<BookingId, Booking> {
        self.bookings.read().clone()
    }

    /// Adds or replaces one booking.
    pub fn add_booking(&self, booking: Booking) {
        self.bookings.write().insert(booking.id, booking);
    }

    /// Merges the bookings of a state snapshot, returning how many there were.
    pub fn load_bookings(&self, snapshot: StoreState) -> usize {
        let count = snapshot.bookings.len();
        self.bookings.write().extend(snapshot.bookings);
        count
    }

    /// Reads a JSON snapshot (`{"bookings": {...}}`) from disk.
    pub fn load_bookings_file(&self, path: &Path) -> Result<usize, StartupError> {
        let json = std::fs::read_to_string(path).map_err(|source| StartupError::BookingsFile {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.load_bookings(StoreState::from_json(&json)?))
    }
}

/// A configured application.
///
/// ```
/// use trailhead::App;
/// use trailhead_config::TrailheadConfig;
///
/// let app = App::new(TrailheadConfig::production());
/// assert!(app.csrf_settings().secure);
/// assert!(!app.pipeline().stage_names().contains(&"cors"));
/// ```
#[derive(Debug)]
pub struct App {
    config: TrailheadConfig,
    state: AppState,
}

impl App {
    /// Builds an application over in-memory stores.
    pub fn new(config: TrailheadConfig) -> Self {
        Self {
            config,
            state: AppState::default(),
        }
    }

    /// Replaces the shared state.
    #[must_use]
    pub fn with_state(mut self, state: AppState) -> Self {
        self.state = state;
        self
    }

    /// The configuration.
    pub fn config(&self) -> &TrailheadConfig {
        &self.config
    }

    /// The shared state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The deployment mode.
    pub fn mode(&self) -> DeploymentMode {
        self.config.environment
    }

    /// Anti-forgery settings: mode defaults plus the security section.
    pub fn csrf_settings(&self) -> CsrfSettings {
        let security = &self.config.security;
        CsrfSettings::for_mode(self.mode())
            .with_cookie_name(security.csrf_cookie_name.clone())
            .with_cookie_path(security.cookie_path.clone())
            .with_header_names(security.csrf_header_names.iter().cloned())
    }

    /// Logging settings for the current mode.
    pub fn log_config(&self) -> LogConfig {
        log_config(&self.config.logging, self.mode())
    }

    /// Metrics settings.
    pub fn metrics_config(&self) -> MetricsConfig {
        metrics_config(&self.config.metrics)
    }

    /// Network-layer settings.
    pub fn server_settings(&self) -> Result<ServerSettings, ConfigError> {
        Ok(ServerSettings::default()
            .with_addr(self.config.socket_addr()?)
            .with_request_timeout(self.config.request_timeout())
            .with_shutdown_timeout(self.config.shutdown_timeout())
            .with_max_body_bytes(self.config.server.max_body_bytes))
    }

    /// The standard pipeline with the demo routes as its dispatcher.
    pub fn pipeline(&self) -> Pipeline {
        let routes = route_table(&self.state, self.mode(), &self.config.security.cookie_path);
        Pipeline::standard(self.mode(), self.csrf_settings(), routes)
    }

    /// Installs the global log subscriber and metrics recorder.
    ///
    /// Call once per process.
    pub fn init_telemetry(&self) -> Result<Option<MetricsRegistry>, StartupError> {
        init_logging(&self.log_config())?;
        Ok(init_metrics(&self.metrics_config())?)
    }

    /// Inserts the demo users.
    pub fn seed_demo_users(&self) -> Result<usize, StartupError> {
        Ok(DemoUserSeeder.apply(self.state.users().as_ref())?)
    }

    /// Builds the server. Attach a metrics registry with
    /// [`Server::with_metrics`].
    pub fn into_server(self) -> Result<Server, StartupError> {
        let settings = self.server_settings()?;
        Ok(Server::new(self.pipeline(), settings).with_health(HealthCheck::default()))
    }
}

fn log_config(section: &LoggingConfig, mode: DeploymentMode) -> LogConfig {
    let format = match section.format {
        trailhead_config::LogFormat::Json => LogFormat::Json,
        trailhead_config::LogFormat::Pretty => LogFormat::Pretty,
    };
    LogConfig {
        enabled: section.enabled,
        level: section.level.clone(),
        format,
        ..LogConfig::for_mode(mode)
    }
}

fn metrics_config(section: &MetricsSection) -> MetricsConfig {
    MetricsConfig {
        enabled: section.enabled,
        duration_buckets: section.histogram_buckets.clone(),
    }
}
