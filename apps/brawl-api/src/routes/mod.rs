pub mod brawl_ids;
pub mod health;

use axum::Router;
use utoipa::OpenApi;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(brawl_ids::router())
        .merge(crate::brawl::server::router())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        brawl_ids::new_brawl_id,
    ),
    components(
        schemas(
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            health::HealthResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Brawls", description = "Brawl room ids"),
    )
)]
pub struct ApiDoc;
