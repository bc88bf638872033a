//! Sync job route handlers

use crate::error::{not_found_error, validation_error, ApiResult, AppError};
use crate::jobs::{JobRecord, JobReporter};
use crate::models::{StartSyncRequest, SuccessResponse, SyncStartedResponse};
use crate::state::SharedState;
use crate::sync::{SyncJob, SyncRequest};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Start a snapshot sync in the background
pub async fn start_sync(
    State(state): State<SharedState>,
    Json(payload): Json<StartSyncRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<SyncStartedResponse>>)> {
    // Validate input
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let request: SyncRequest = payload.into();
    let (job_id, cancel) = state.jobs.start(request.clone()).await.map_err(|running| {
        AppError::Conflict(format!(
            "A sync of {} is already running as job {}",
            request.governance_address, running
        ))
    })?;

    info!(
        "Spawning sync job {} for {} (force_refresh={})",
        job_id, request.governance_address, request.force_refresh
    );

    let task_state = state.clone();
    tokio::spawn(async move {
        let reporter = JobReporter::new(task_state.jobs.clone(), job_id);
        let job = SyncJob::new(
            task_state.rpc.as_ref(),
            task_state.storage.as_ref(),
            task_state.codec.as_ref(),
            &task_state.options,
            &reporter,
            cancel,
        );
        let result = job.run(&request).await;
        task_state.jobs.finish(job_id, result).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(SuccessResponse::with_data(
            "Sync started",
            SyncStartedResponse { job_id },
        )),
    ))
}

/// List all known jobs
pub async fn list_jobs(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<Vec<JobRecord>>>> {
    let jobs = state.jobs.list().await;
    Ok(Json(SuccessResponse::with_data(
        format!("{} jobs", jobs.len()),
        jobs,
    )))
}

/// Latest progress and result of one job
pub async fn get_job(
    State(state): State<SharedState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<JobRecord>>> {
    let record = state
        .jobs
        .get(job_id)
        .await
        .ok_or_else(|| not_found_error(format!("Job {} not found", job_id)))?;

    Ok(Json(SuccessResponse::with_data("Job found", record)))
}

/// Cancel a running job
pub async fn cancel_job(
    State(state): State<SharedState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse<JobRecord>>> {
    let record = state
        .jobs
        .cancel(job_id)
        .await
        .ok_or_else(|| not_found_error(format!("Job {} not found", job_id)))?;

    Ok(Json(SuccessResponse::with_data(
        "Cancellation requested",
        record,
    )))
}
