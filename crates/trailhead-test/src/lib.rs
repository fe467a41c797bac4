//! # Trailhead Test
//!
//! In-memory end-to-end testing for Trailhead applications. Requests go
//! through [`trailhead_server::Server::handle`], so health checks, body
//! limits and every pipeline stage run exactly as they do behind a
//! socket, without binding a port.
//!
//! - [`TestClient`] - Sends requests and keeps a cookie jar
//! - [`TestRequest`] / [`TestRequestBuilder`] - Request construction
//! - [`TestResponse`] - Collected response with assertion helpers
//!
//! The jar makes the anti-forgery flow short: the first safe request
//! receives the secret cookie, and [`TestClientRequest::with_csrf`] mints
//! a matching token for the next state-changing request.
//!
//! ```rust,ignore
//! let client = TestClient::new(app.into_server());
//! client.get("/api/csrf/restore").send().await;
//!
//! client
//!     .post("/api/users")
//!     .with_csrf()
//!     .json(&json!({ "email": "camper@trail.dev", "username": "camper", "password": "pw" }))
//!     .send()
//!     .await
//!     .assert_status(StatusCode::CREATED);
//! ```

#![doc(html_root_url = "https://docs.rs/trailhead-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use request::{TestRequest, TestRequestBuilder, CSRF_TOKEN_HEADER};
pub use response::TestResponse;
