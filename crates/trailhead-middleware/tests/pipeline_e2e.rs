//! End-to-end tests for the standard pipeline.

use bytes::Bytes;
use http::{header, Method, StatusCode};
use http_body_util::{BodyExt, Full};
use trailhead_core::{AppError, DeploymentMode, ErrorBody, FieldViolation};
use trailhead_middleware::stages::{CsrfHandle, CsrfSettings, CsrfTokens, JsonBody};
use trailhead_middleware::{
    DispatchOutcome, FnDispatcher, MiddlewareContext, Pipeline, Request, RequestPhase, Response,
    ResponseExt,
};

fn routes(ctx: &mut MiddlewareContext, request: Request) -> DispatchOutcome {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    match (method, path.as_str()) {
        (Method::GET, "/api/ping") => {
            let has_handle = ctx.has_extension::<CsrfHandle>();
            DispatchOutcome::Handled(Response::json(
                StatusCode::OK,
                &serde_json::json!({ "pong": true, "csrf": has_handle }),
            ))
        }
        (Method::POST, "/api/users") => {
            let email = ctx
                .get_extension::<JsonBody>()
                .and_then(|b| b.field("email"))
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string();
            if email == "demo@user.demo" {
                DispatchOutcome::Failed(AppError::validation(
                    "Validation error",
                    vec![FieldViolation::unique("email"), FieldViolation::unique("username")],
                ))
            } else {
                DispatchOutcome::Handled(Response::json(
                    StatusCode::CREATED,
                    &serde_json::json!({ "email": email }),
                ))
            }
        }
        (Method::GET, "/api/explode") => {
            DispatchOutcome::Failed(AppError::unclassified("database unreachable"))
        }
        _ => DispatchOutcome::Unclaimed(request),
    }
}

fn pipeline(mode: DeploymentMode) -> Pipeline {
    Pipeline::standard(mode, CsrfSettings::for_mode(mode), FnDispatcher::new(routes))
}

fn get(path: &str) -> Request {
    http::Request::builder()
        .method(Method::GET)
        .uri(path)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

fn post_json(path: &str, cookie: Option<&str>, token: Option<&str>, body: &str) -> Request {
    let mut builder = http::Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    if let Some(token) = token {
        builder = builder.header("xsrf-token", token);
    }
    builder.body(Full::new(Bytes::from(body.to_string()))).unwrap()
}

async fn error_body(response: Response) -> ErrorBody {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn unclaimed_route_is_resource_not_found() {
    let response = pipeline(DeploymentMode::Development)
        .handle(get("/api/does-not-exist"))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = error_body(response).await;
    assert_eq!(body.title, "Resource Not Found");
    assert_eq!(body.message, "The requested resource couldn't be found.");
    assert_eq!(
        body.errors,
        Some(vec!["The requested resource couldn't be found".to_string()])
    );
}

#[tokio::test]
async fn stack_is_null_only_in_production() {
    let prod = pipeline(DeploymentMode::Production).handle(get("/api/explode")).await;
    assert_eq!(prod.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = error_body(prod).await;
    assert_eq!(body.title, "Server Error");
    assert!(body.stack.is_none());

    for mode in [DeploymentMode::Development, DeploymentMode::Test] {
        let response = pipeline(mode).handle(get("/api/explode")).await;
        let body = error_body(response).await;
        assert!(body.stack.is_some_and(|s| !s.is_empty()));
    }
}

#[tokio::test]
async fn missing_token_in_production_is_forbidden_before_dispatch() {
    let response = pipeline(DeploymentMode::Production)
        .handle(post_json(
            "/api/users",
            Some("_csrf=some-secret"),
            None,
            r#"{"email":"new@user.com"}"#,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = error_body(response).await;
    assert_eq!(body.title, "Authorization error");
    assert_eq!(body.message, "invalid csrf token");
}

#[tokio::test]
async fn valid_token_reaches_dispatcher() {
    let secret = CsrfTokens.create_secret();
    let token = CsrfTokens.create_token(&secret);
    let cookie = format!("_csrf={secret}");

    let response = pipeline(DeploymentMode::Production)
        .handle(post_json(
            "/api/users",
            Some(&cookie),
            Some(&token),
            r#"{"email":"new@user.com"}"#,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn validation_errors_are_listed_in_order() {
    let secret = CsrfTokens.create_secret();
    let token = CsrfTokens.create_token(&secret);
    let cookie = format!("_csrf={secret}");

    let response = pipeline(DeploymentMode::Development)
        .handle(post_json(
            "/api/users",
            Some(&cookie),
            Some(&token),
            r#"{"email":"demo@user.demo"}"#,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = error_body(response).await;
    assert_eq!(body.title, "Validation error");
    assert_eq!(
        body.errors.unwrap(),
        vec!["email must be unique", "username must be unique"]
    );
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let response = pipeline(DeploymentMode::Development)
        .handle(post_json("/api/users", None, None, "{oops"))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_body(response).await.title, "Bad Request");
}

#[tokio::test]
async fn resource_policy_header_on_success_and_error() {
    let pipeline = pipeline(DeploymentMode::Production);

    let ok = pipeline.handle(get("/api/ping")).await;
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(
        ok.headers().get("cross-origin-resource-policy").unwrap(),
        "cross-origin"
    );

    let missing = pipeline.handle(get("/nowhere")).await;
    assert_eq!(
        missing.headers().get("cross-origin-resource-policy").unwrap(),
        "cross-origin"
    );
}

#[tokio::test]
async fn cors_only_outside_production() {
    let request = || {
        http::Request::builder()
            .uri("/api/ping")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Full::new(Bytes::new()))
            .unwrap()
    };

    let dev = pipeline(DeploymentMode::Development).handle(request()).await;
    assert_eq!(dev.headers().get("access-control-allow-origin").unwrap(), "*");

    let prod = pipeline(DeploymentMode::Production).handle(request()).await;
    assert!(prod.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn first_visit_sets_secret_cookie_once() {
    let pipeline = pipeline(DeploymentMode::Production);

    let first = pipeline.handle(get("/api/ping")).await;
    let cookies: Vec<_> = first.headers().get_all(header::SET_COOKIE).iter().collect();
    assert_eq!(cookies.len(), 1);
    let cookie = cookies[0].to_str().unwrap();
    assert!(cookie.starts_with("_csrf="));
    assert!(cookie.contains("Secure"));
    assert!(cookie.contains("SameSite=Lax"));

    let mut again = get("/api/ping");
    again
        .headers_mut()
        .insert(header::COOKIE, "_csrf=already-issued".parse().unwrap());
    let second = pipeline.handle(again).await;
    assert!(second.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn lifecycle_ends_in_a_terminal_phase() {
    let pipeline = pipeline(DeploymentMode::Test);

    let mut ctx = MiddlewareContext::new();
    pipeline.process(&mut ctx, get("/api/ping")).await;
    assert_eq!(ctx.phase(), RequestPhase::HandlerCompleted);

    let mut ctx = MiddlewareContext::new();
    pipeline.process(&mut ctx, get("/missing")).await;
    assert_eq!(ctx.phase(), RequestPhase::Responded);
    assert!(ctx.lifecycle().faulted());

    let preflight = http::Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/users")
        .header(header::ORIGIN, "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let mut ctx = MiddlewareContext::new();
    let response = crate::pipeline(DeploymentMode::Development)
        .process(&mut ctx, preflight)
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(ctx.phase(), RequestPhase::PolicyAnswered);
    assert!(ctx.lifecycle().is_finished());
    assert!(!ctx.lifecycle().faulted());
}
