//! Job submission, status, polling, and download endpoints.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, Path, RawQuery},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

use texapi_core::JobId;
use texapi_infra::{
    assets::AssetFormat,
    jobs::{JobStore, WaitDecision},
};

use super::{download_path, status_path, wait_path};
use crate::app::dto::{FLAG_LOG_ON_ERROR, FLAG_REPORT_URLS, JobLinks, PARAM_LOOP, QueryParams};
use crate::app::errors::{self, ApiError};
use crate::app::services::AppServices;

/// POST /job
///
/// Materialize the body into a new job directory, start the build, and send
/// the client to the wait endpoint (or report the job's links).
pub async fn start_new_job(
    Extension(services): Extension<Arc<AppServices>>,
    RawQuery(raw): RawQuery,
    body: Bytes,
) -> Result<Response, ApiError> {
    let params = QueryParams::parse(raw.as_deref());
    let id = JobId::new();
    let job_dir = services.layout.job_dir(id);

    let materializer = services.materializer.clone();
    let target = job_dir.clone();
    let materialized = tokio::task::spawn_blocking(move || materializer.materialize(body.to_vec(), &target))
        .await
        .map_err(|e| ApiError::internal("materializing input", e))?;

    let files = match materialized {
        Ok(files) => files,
        Err(err) => {
            discard_job_dir(id, &job_dir).await;
            return Err(err.into());
        }
    };

    if let Err(err) = services.start_job(id) {
        discard_job_dir(id, &job_dir).await;
        return Err(ApiError::internal("creating status file", err));
    }
    info!(job_id = %id, files, "job created");

    if params.has(FLAG_REPORT_URLS) {
        return Ok(Json(JobLinks {
            download: download_path(id),
            status: status_path(id),
            wait: wait_path(id),
        })
        .into_response());
    }

    Ok(found(params.append_to(&wait_path(id))))
}

/// GET /job/:id
pub async fn get_job_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: JobId = id.parse()?;
    let record = services.store.load(id)?;
    Ok(Json(record).into_response())
}

/// GET /job/:id/wait?loop=N
///
/// Holds the request for `base^(N+1)` seconds while the job runs, then sends
/// the client back here with the incremented counter.
pub async fn wait_for_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    RawQuery(raw): RawQuery,
) -> Result<Response, ApiError> {
    let id: JobId = id.parse()?;
    let mut params = QueryParams::parse(raw.as_deref());
    let record = services.store.load(id)?;

    let decision = services.wait_policy.decide(
        record.status,
        params.loop_count(),
        params.has(FLAG_LOG_ON_ERROR),
    );

    match decision {
        WaitDecision::Retry { delay, next_loop } => {
            tokio::time::sleep(delay).await;
            params.set(PARAM_LOOP, next_loop.to_string());
            Ok(found(params.append_to(&wait_path(id))))
        }
        WaitDecision::Download => Ok(found(params.append_to(&download_path(id)))),
        WaitDecision::Failed => Ok(errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "processing_failed",
            "Processing ran into an error.",
        )),
    }
}

/// GET /job/:id/download
///
/// `Accept` picks tar, pdf, or zip (default); `log-on-error` lets the pdf
/// mode fall back to the build log.
pub async fn download_assets(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    RawQuery(raw): RawQuery,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let id: JobId = id.parse()?;
    let params = QueryParams::parse(raw.as_deref());
    services.store.load(id)?;

    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok());
    let format = AssetFormat::negotiate(accept);
    let log_on_error = params.has(FLAG_LOG_ON_ERROR);

    let packager = services.packager.clone();
    let asset = tokio::task::spawn_blocking(move || packager.package(id, format, log_on_error))
        .await
        .map_err(|e| ApiError::internal("generating downloadable asset", e))??;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, asset.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", asset.filename(id)),
            ),
        ],
        asset.body,
    )
        .into_response())
}

/// Best-effort removal of a job directory that never got a status record.
async fn discard_job_dir(id: JobId, job_dir: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_dir_all(job_dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(job_id = %id, error = %e, "removing abandoned job dir");
        }
    }
}

fn found(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}
