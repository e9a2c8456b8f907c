pub mod check;
pub mod health;

use crate::AppState;
use axum::Router;
use utoipa::OpenApi;

/// All API routes, mounted at /api
pub fn router() -> Router<AppState> {
    Router::new().merge(check::router()).merge(health::router())
}

/// Generate the complete OpenAPI document by merging all module docs
pub fn openapi() -> utoipa::openapi::OpenApi {
    #[derive(OpenApi)]
    #[openapi(info(
        title = "vegancheck",
        description = "Classifies ingredient lists as vegan, non-vegan or uncertain."
    ))]
    struct BaseApi;

    let mut spec = BaseApi::openapi();

    let modules: Vec<utoipa::openapi::OpenApi> =
        vec![check::ApiDoc::openapi(), health::ApiDoc::openapi()];

    for module_spec in modules {
        spec.merge(module_spec);
    }

    spec
}
