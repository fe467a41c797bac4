//! # Trailhead Core
//!
//! Core types shared by every Trailhead crate.
//!
//! - [`AppError`] - Closed error taxonomy raised by pipeline stages, dispatchers and stores
//! - [`NormalizedError`] - The enriched, request-scoped form of an error consumed by the responder
//! - [`ErrorBody`] - The fixed-shape JSON body sent to clients on the error path
//! - [`DeploymentMode`] - Production vs. non-production behavior switch
//! - [`RequestId`] - UUID v7 request identifier

#![doc(html_root_url = "https://docs.rs/trailhead-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod error;
mod mode;
mod normalized;

pub use context::RequestId;
pub use error::{AppError, AppResult, ErrorKind, FieldViolation};
pub use mode::{DeploymentMode, ParseModeError};
pub use normalized::{ErrorBody, NormalizedError, DEFAULT_TITLE};
