use axum::{
    Router,
    routing::{get, post},
};

use texapi_core::JobId;

pub mod jobs;
pub mod system;

/// Router for the job endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/job", post(jobs::start_new_job))
        .route("/job/:id", get(jobs::get_job_status))
        .route("/job/:id/wait", get(jobs::wait_for_job))
        .route("/job/:id/download", get(jobs::download_assets))
}

pub fn status_path(id: JobId) -> String {
    format!("/job/{id}")
}

pub fn wait_path(id: JobId) -> String {
    format!("/job/{id}/wait")
}

pub fn download_path(id: JobId) -> String {
    format!("/job/{id}/download")
}
