//! # Trailhead Middleware
//!
//! The request processing pipeline for the Trailhead booking API.
//!
//! ## Pipeline Stages
//!
//! ```text
//! Request → RequestLog → CookieParser → JsonBody → Cors* → ResourcePolicy → Csrf → Dispatcher
//!                                                                                     ↓
//! Response ←───────────── ErrorResponder ← ErrorClassifier ← (any Err) ← NotFound fallback
//! ```
//!
//! `*` CORS is installed only outside production.
//!
//! | Stage | Middleware | Purpose |
//! |-------|------------|---------|
//! | 1 | Request log | Access log line, request metrics |
//! | 2 | Cookie parser | Parse the `Cookie` header |
//! | 3 | JSON body | Parse `application/json` bodies |
//! | 4 | CORS | Permissive cross-origin access in development |
//! | 5 | Resource policy | `Cross-Origin-Resource-Policy: cross-origin` |
//! | 6 | CSRF | Secret cookie and token check |
//! | 7 | Dispatch | Business routes (external) |
//! | 8 | Not found | Error for unclaimed requests |
//! | 9 | Error classifier | Title and detail messages |
//! | 10 | Error responder | JSON error body |
//!
//! Every stage returns `Result<Response, AppError>`; the first `Err`
//! short-circuits to the classifier and responder.
//!
//! ```
//! use trailhead_middleware::pipeline::Stage;
//!
//! let stages = Stage::all();
//! assert_eq!(stages.len(), 10);
//! assert_eq!(stages[0].name(), "request_log");
//! assert_eq!(stages[9].name(), "error_responder");
//! ```

#![doc(html_root_url = "https://docs.rs/trailhead-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod cookie;
pub mod dispatch;
pub mod lifecycle;
pub mod middleware;
pub mod pipeline;
pub mod stages;
pub mod types;

pub use context::MiddlewareContext;
pub use dispatch::{DispatchOutcome, Dispatcher, FnDispatcher, NoRoutes};
pub use lifecycle::{LifecycleError, RequestLifecycle, RequestPhase};
pub use middleware::{BoxFuture, Middleware, Next, StageResult};
pub use pipeline::{Pipeline, PipelineBuilder, Stage, StageGroup, REQUEST_ID_HEADER};
pub use types::{Request, Response, ResponseExt};
