//! Upload Route
//!
//! `POST /upload` takes a multipart `file` field and runs it through the
//! pipeline: save → build CAR → commP → add CAR → add original → respond.
//! Both scratch files are owned by guards and vanish on every exit path.

use std::path::Path;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    routing::post,
    Json, Router,
};
use tokio::io::AsyncWriteExt;

use crate::archive;
use crate::cids::to_base32;
use crate::commp;
use crate::error::{AppError, Result};
use crate::ipfs::FileKind;
use crate::scratch::ScratchFile;
use crate::state::AppState;
use crate::types::UploadResponse;

/// Multipart field carrying the upload
pub const FILE_FIELD: &str = "file";

pub fn router() -> Router<AppState> {
    Router::new().route("/upload", post(upload))
}

/// POST /upload
#[tracing::instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn upload(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>> {
    let multipart = multipart.map_err(|e| {
        tracing::debug!(error = %e, "Rejected multipart body");
        AppError::MissingFile
    })?;

    let input = ScratchFile::new_in(&state.config().upload.scratch_dir);
    let size = save_file_field(multipart, input.path()).await?;
    tracing::info!(path = %input.path().display(), size, "Received upload");

    let mut response = UploadResponse::default();

    let car = input.sibling("car");
    let summary = archive::generate_car(input.path(), car.path()).await?;
    response.payload_cid = to_base32(&summary.root);

    let commitment = commp::compute(car.path()).await?;
    response.comm_p_cid = to_base32(&commitment.piece.piece_cid);
    response.piece_size = commitment.piece.piece_size();
    response.car_file_size = commitment.file_size;

    tracing::info!(
        payload_cid = %response.payload_cid,
        comm_p_cid = %response.comm_p_cid,
        piece_size = response.piece_size,
        car_file_size = response.car_file_size,
        commp_bytes = commitment.piece.payload_size,
        blocks = summary.blocks,
        "Built CAR and piece commitment"
    );

    for (path, kind) in [
        (car.path(), FileKind::Archive),
        (input.path(), FileKind::Original),
    ] {
        state
            .ipfs()
            .upload(path, kind, &mut response)
            .await
            .map_err(|source| AppError::Storage { kind, source })?;
    }

    tracing::info!(cid = %response.cid, car_link = %response.car_link, "Upload complete");

    Ok(Json(response))
}

/// Stream the `file` field to `dest`, returning the bytes written
async fn save_file_field(mut multipart: Multipart, dest: &Path) -> Result<u64> {
    while let Some(mut field) = multipart.next_field().await.map_err(|e| {
        tracing::debug!(error = %e, "Malformed multipart body");
        AppError::MissingFile
    })? {
        if field.name() != Some(FILE_FIELD) || field.file_name().is_none() {
            continue;
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(AppError::SaveUpload)?;
        let mut written = 0u64;

        while let Some(chunk) = field.chunk().await.map_err(|e| {
            tracing::debug!(error = %e, "Failed to read file field");
            AppError::MissingFile
        })? {
            file.write_all(&chunk).await.map_err(AppError::SaveUpload)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(AppError::SaveUpload)?;

        return Ok(written);
    }

    Err(AppError::MissingFile)
}
