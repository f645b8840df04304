use crate::errors::ApiError;
use crate::server::AppState;
use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{
    classify::ServerErrorsAsFailures, classify::SharedClassifier,
    cors::CorsLayer, trace::TraceLayer,
};
use tracing::warn;

// Simplified middleware stack
pub fn create_middleware_stack() -> ServiceBuilder<
    tower::layer::util::Stack<
        CorsLayer,
        tower::layer::util::Stack<
            TraceLayer<SharedClassifier<ServerErrorsAsFailures>>,
            tower::layer::util::Identity,
        >,
    >,
> {
    ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Basic-auth gate for the diagnostic endpoints; a no-op unless a
/// credential pair is configured.
pub async fn endpoint_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.endpoint_auth.clone() else {
        return next.run(request).await;
    };

    let Some(header) = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    else {
        return unauthorized_challenge();
    };
    let Some((scheme, payload)) = header.split_once(' ') else {
        return bad_request(
            "Malformed request, basic authentication expected",
        );
    };
    if !scheme.eq_ignore_ascii_case("basic") || payload.is_empty() {
        return bad_request(
            "Malformed request, basic authentication expected",
        );
    }

    let decoded = match base64::engine::general_purpose::STANDARD
        .decode(payload)
    {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => {
            return bad_request("Malformed request, authentication invalid");
        }
    };
    let Some((user, key)) = decoded.split_once(':') else {
        return bad_request("Malformed request, authentication invalid");
    };
    let Some((expected_user, expected_key)) = expected.split_once(':') else {
        warn!("configured endpoint credentials are malformed");
        return unauthorized_challenge();
    };

    if user == expected_user && key == expected_key {
        next.run(request).await
    } else {
        warn!("invalid key");
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Invalid key"})),
        )
            .into_response()
    }
}

fn unauthorized_challenge() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(http::header::WWW_AUTHENTICATE, "Basic realm=\"Private\"")],
        "",
    )
        .into_response()
}

fn bad_request(message: &str) -> Response {
    ApiError::BadRequest(message.to_string()).into_response()
}
