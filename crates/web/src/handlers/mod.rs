use std::path::PathBuf;

use axum::{
    Router,
    extract::Request,
    http::{HeaderValue, header},
    routing::get,
};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::AppState;

mod og;

pub fn build_router(public_dir: PathBuf) -> Router<AppState> {
    Router::new()
        .route("/og/docs/{*slug}", get(og::get_og_docs))
        .route("/{lang}/og/docs/{*slug}", get(og::get_og_docs_localized))
        .fallback_service(<ServeDir as ServiceExt<Request>>::map_response(
            ServeDir::new(public_dir),
            |mut response| {
                // Cache non-hashed public files for a day, mark must-revalidate
                response.headers_mut().insert(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("public, max-age=86400, must-revalidate"),
                );
                response
            },
        ))
}
