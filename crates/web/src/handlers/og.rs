use axum::{
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use docs_og_core::{AppError, util::split_segments};
use docs_og_images::og::render_page;

use crate::AppState;

/// Images for a page never change once generated.
const CACHE_IMMUTABLE: &str = "public, max-age=31536000, immutable";

pub async fn get_og_docs(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    og_response(&state, None, &slug).await
}

pub async fn get_og_docs_localized(
    State(state): State<AppState>,
    Path((lang, slug)): Path<(String, String)>,
) -> Result<Response, AppError> {
    og_response(&state, Some(&lang), &slug).await
}

async fn og_response(
    state: &AppState,
    locale: Option<&str>,
    slug: &str,
) -> Result<Response, AppError> {
    let segments = split_segments(slug);
    // The last segment names the image variant, not the page.
    let Some((_, slugs)) = segments.split_last() else {
        return Err(AppError::Status(StatusCode::NOT_FOUND));
    };
    let page = state
        .pages
        .get_page(slugs, locale)
        .ok_or_else(|| AppError::Status(StatusCode::NOT_FOUND))?;
    let image = render_page(
        state.renderer.as_ref(),
        &state.fonts,
        &page.data,
        &state.site_url,
        &state.config.site.name,
    )
    .await?;
    let content_type = HeaderValue::from_str(image.content_type.as_ref())?;
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, HeaderValue::from_static(CACHE_IMMUTABLE)),
        ],
        image.data,
    )
        .into_response())
}
