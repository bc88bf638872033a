//! Manifest route handler

use crate::error::{not_found_error, ApiResult};
use crate::models::{Manifest, SuccessResponse};
use crate::state::SharedState;
use crate::sync::manifest::{LoadedManifest, ManifestManager};
use axum::{extract::State, Json};

/// Decompressed lookup manifest of the configured pool
pub async fn get_manifest(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<Manifest>>> {
    let manager = ManifestManager::new(
        state.storage.as_ref(),
        state.codec.as_ref(),
        &state.options.pool,
    );

    match manager.load().await? {
        LoadedManifest::Found(manifest) => Ok(Json(SuccessResponse::with_data(
            format!("{} entries", manifest.len()),
            manifest,
        ))),
        LoadedManifest::NotFound => Err(not_found_error(format!(
            "No manifest in pool {}",
            state.options.pool
        ))),
    }
}
