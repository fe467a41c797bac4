//! Demo business routes.
//!
//! | Method | Path | Handler |
//! |---|---|---|
//! | `GET` | `/api/csrf/restore` | [`RestoreCsrf`] |
//! | `POST` | `/api/users` | [`SignUp`] |
//! | `GET` | `/api/users/{userId}/bookings` | [`ListBookings`] |

use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use trailhead_bookings::{user_bookings, BookingItemProps, Session, SessionUser, StoreState, UserId};
use trailhead_core::{AppError, DeploymentMode, FieldViolation};
use trailhead_middleware::cookie::{SameSite, SetCookie};
use trailhead_middleware::stages::{CsrfHandle, JsonBody};
use trailhead_middleware::{BoxFuture, MiddlewareContext, Request, Response, ResponseExt, StageResult};
use trailhead_server::{PathParams, RouteHandler, RouteTable};
use trailhead_store::{hash_password, User, UserRecord, VALIDATION_MESSAGE};

use crate::app::AppState;

/// Cookie the browser client reads the anti-forgery token from.
pub const XSRF_COOKIE: &str = "XSRF-TOKEN";

/// Builds the route table for an application.
pub fn route_table(state: &AppState, mode: DeploymentMode, cookie_path: &str) -> RouteTable {
    RouteTable::new()
        .route(
            Method::GET,
            "/api/csrf/restore",
            RestoreCsrf {
                mode,
                cookie_path: cookie_path.to_string(),
            },
        )
        .route(Method::POST, "/api/users", SignUp { state: state.clone() })
        .route(
            Method::GET,
            "/api/users/{userId}/bookings",
            ListBookings { state: state.clone() },
        )
}

/// Mints a token from the client's secret and hands it to scripts, both
/// in an `XSRF-TOKEN` cookie (not `HttpOnly`) and in the body.
#[derive(Debug, Clone)]
pub struct RestoreCsrf {
    mode: DeploymentMode,
    cookie_path: String,
}

#[derive(Debug, Serialize)]
struct RestoredToken {
    #[serde(rename = "XSRF-Token")]
    token: String,
}

impl RouteHandler for RestoreCsrf {
    fn call<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        _request: Request,
        _params: PathParams,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            let token = ctx
                .get_extension::<CsrfHandle>()
                .map(CsrfHandle::token)
                .ok_or_else(|| AppError::unclassified("anti-forgery protection is not installed"))?;

            let production = self.mode.is_production();
            let cookie = SetCookie::new(XSRF_COOKIE, token.clone())
                .path(self.cookie_path.clone())
                .secure(production)
                .http_only(false)
                .maybe_same_site(production.then_some(SameSite::Lax));
            ctx.set_cookie(&cookie);

            Ok(Response::json(StatusCode::OK, &RestoredToken { token }))
        })
    }
}

/// Sign-up payload. Extra fields such as `_csrf` are ignored.
#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    /// Email address.
    pub email: String,
    /// Display name.
    pub username: String,
    /// Plain-text password, hashed before it reaches the store.
    pub password: String,
}

#[derive(Debug, Serialize)]
struct SignedUp {
    user: User,
}

/// Creates a user. Store constraint failures surface as validation errors.
#[derive(Clone)]
pub struct SignUp {
    state: AppState,
}

impl RouteHandler for SignUp {
    fn call<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        _request: Request,
        _params: PathParams,
    ) -> BoxFuture<'a, StageResult> {
        let body = ctx
            .get_extension::<JsonBody>()
            .map(JsonBody::deserialize::<SignUpRequest>);

        Box::pin(async move {
            let signup = body.ok_or_else(|| AppError::malformed_body("expected a JSON body"))??;

            if signup.password.is_empty() {
                return Err(AppError::validation(
                    VALIDATION_MESSAGE,
                    vec![FieldViolation::new("password", "password must not be empty")],
                ));
            }

            let password = signup.password;
            let hashed = tokio::task::spawn_blocking(move || hash_password(&password))
                .await
                .map_err(|e| AppError::unclassified_with_source("password hashing failed", e))??;

            let user = self
                .state
                .users()
                .insert(UserRecord::new(signup.email, signup.username, hashed))?;
            tracing::info!(user_id = user.id, username = %user.username, "user signed up");

            Ok(Response::json(StatusCode::CREATED, &SignedUp { user }))
        })
    }
}

#[derive(Debug, Serialize)]
struct BookingList {
    bookings: Vec<BookingItemProps>,
}

/// Lists the bookings owned by the user in the path.
#[derive(Clone)]
pub struct ListBookings {
    state: AppState,
}

impl RouteHandler for ListBookings {
    fn call<'a>(
        &'a self,
        _ctx: &'a mut MiddlewareContext,
        _request: Request,
        params: PathParams,
    ) -> BoxFuture<'a, StageResult> {
        Box::pin(async move {
            let user_id = params
                .get("userId")
                .and_then(|raw| raw.parse::<UserId>().ok())
                .ok_or(AppError::NotFound)?;

            let view = StoreState {
                bookings: self.state.bookings(),
                session: Session {
                    user: Some(SessionUser { id: user_id }),
                },
            };

            Ok(Response::json(
                StatusCode::OK,
                &BookingList {
                    bookings: user_bookings(&view),
                },
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trailhead_middleware::{DispatchOutcome, Dispatcher};

    fn request(method: Method, uri: &str) -> Request {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Default::default())
            .unwrap()
    }

    #[tokio::test]
    async fn test_restore_without_csrf_stage_fails() {
        let state = AppState::default();
        let table = route_table(&state, DeploymentMode::Development, "/");
        let mut ctx = MiddlewareContext::new();

        let outcome = table
            .dispatch(&mut ctx, request(Method::GET, "/api/csrf/restore"))
            .await;
        assert!(matches!(outcome, DispatchOutcome::Failed(AppError::Unclassified { .. })));
    }

    #[tokio::test]
    async fn test_signup_without_body_is_malformed() {
        let state = AppState::default();
        let table = route_table(&state, DeploymentMode::Development, "/");
        let mut ctx = MiddlewareContext::new();

        let outcome = table.dispatch(&mut ctx, request(Method::POST, "/api/users")).await;
        assert!(matches!(outcome, DispatchOutcome::Failed(AppError::MalformedBody { .. })));
    }

    #[tokio::test]
    async fn test_non_numeric_user_id_is_not_found() {
        let state = AppState::default();
        let table = route_table(&state, DeploymentMode::Development, "/");
        let mut ctx = MiddlewareContext::new();

        let outcome = table
            .dispatch(&mut ctx, request(Method::GET, "/api/users/abc/bookings"))
            .await;
        assert!(matches!(outcome, DispatchOutcome::Failed(AppError::NotFound)));
    }

    #[test]
    fn test_route_count() {
        let table = route_table(&AppState::default(), DeploymentMode::Production, "/");
        assert_eq!(table.len(), 3);
    }
}
