//! Pipeline stages.
//!
//! ## Ingress normalizers
//!
//! 1. [`request_log`] - Access log line and request metrics
//! 2. [`cookie_parser`] - Parse the `Cookie` header
//! 3. [`json_body`] - Parse `application/json` bodies
//!
//! ## Access policy filters
//!
//! 4. [`cors`] - Permissive CORS (non-production only)
//! 5. [`resource_policy`] - `Cross-Origin-Resource-Policy` header
//! 6. [`csrf`] - Anti-forgery secret and token check
//!
//! ## After dispatch
//!
//! 7. [`fallback`] - NotFound for unclaimed requests
//! 8. [`error_classifier`] - Title and detail list
//! 9. [`error_responder`] - JSON error body

pub mod cookie_parser;
pub mod cors;
pub mod csrf;
pub mod error_classifier;
pub mod error_responder;
pub mod fallback;
pub mod json_body;
pub mod request_log;
pub mod resource_policy;

pub use cookie_parser::CookieParserMiddleware;
pub use cors::{CorsBuilder, CorsMiddleware};
pub use csrf::{CsrfHandle, CsrfMiddleware, CsrfSettings, CsrfTokens};
pub use error_classifier::ErrorClassifier;
pub use error_responder::ErrorResponder;
pub use fallback::NotFoundFallback;
pub use json_body::{JsonBody, JsonBodyMiddleware};
pub use request_log::RequestLogMiddleware;
pub use resource_policy::{ResourcePolicy, ResourcePolicyMiddleware};
