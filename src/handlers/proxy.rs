use axum::{
    body::Body,
    extract::{Path, State},
    http::Request,
    response::{IntoResponse, Response},
};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::{error::AppError, services::proxy::FileProxy};

/// Serves an allowlisted file from the proxy directory.
/// 403 for names off the allowlist, 404 if the file is missing.
pub async fn serve_file(
    State(proxy): State<FileProxy>,
    Path(file): Path<String>,
    req: Request<Body>,
) -> Result<Response, AppError> {
    let path = proxy.resolve(&file)?;
    match ServeFile::new(path).oneshot(req).await {
        Ok(response) => Ok(response.into_response()),
        Err(never) => match never {},
    }
}
