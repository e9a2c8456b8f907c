use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use utoipa::{OpenApi, ToSchema};
use vegancheck_core::{
    CheckStatus, ClassificationResult, Classifier, FlagSource, FlaggedItem, VeganStatus,
};

pub const NOT_CONFIGURED: &str = "Service is not configured.";
const MISSING_INGREDIENTS: &str = "No ingredients were provided.";

/// What the check endpoint runs against.
pub enum CheckService {
    Ready(Classifier),
    /// Started without a usable database; every check is refused.
    Unavailable(String),
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckRequest {
    /// Free-text ingredient list as printed on the label
    #[schema(example = "Water, Sugar, Honey, Salt")]
    pub ingredients: String,
}

/// Returns the router for the check endpoint (mounted at /api)
pub fn router() -> Router<AppState> {
    Router::new().route("/check", post(check))
}

/// Pull the `ingredients` string out of a request body.
///
/// The body is parsed leniently: anything that is not an object with a string
/// `ingredients` field yields `None`.
fn extract_ingredients(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value
        .get("ingredients")?
        .as_str()
        .map(|s| s.to_string())
}

#[utoipa::path(
    post,
    path = "/api/check",
    tag = "check",
    request_body = CheckRequest,
    responses(
        (status = 200, description = "Classification result", body = ClassificationResult),
        (status = 500, description = "Analysis failed", body = ClassificationResult),
        (status = 503, description = "Service is not configured", body = ClassificationResult)
    )
)]
pub async fn check(State(service): State<AppState>, body: Bytes) -> impl IntoResponse {
    let classifier = match service.as_ref() {
        CheckService::Ready(classifier) => classifier,
        CheckService::Unavailable(reason) => {
            tracing::warn!(reason = %reason, "Refusing check, service unavailable");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ClassificationResult::error(NOT_CONFIGURED)),
            )
                .into_response();
        }
    };

    let Some(ingredients) = extract_ingredients(&body) else {
        tracing::debug!("Request had no ingredients string");
        return (
            StatusCode::OK,
            Json(ClassificationResult::unclear(MISSING_INGREDIENTS)),
        )
            .into_response();
    };

    let result = classifier.classify(&ingredients).await;
    let status = match result.status {
        CheckStatus::Error => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    };

    (status, Json(result)).into_response()
}

#[derive(OpenApi)]
#[openapi(
    paths(check),
    components(schemas(
        CheckRequest,
        ClassificationResult,
        FlaggedItem,
        CheckStatus,
        VeganStatus,
        FlagSource
    ))
)]
pub struct ApiDoc;
