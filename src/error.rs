//! Error types for the CAR upload server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::commp::CommPError;
use crate::ipfs::{FileKind, IpfsError};

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Failure of one upload pipeline stage
#[derive(Error, Debug)]
pub enum AppError {
    #[error("failed to read file")]
    MissingFile,

    #[error("failed to save uploaded file: {0}")]
    SaveUpload(#[source] std::io::Error),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Commitment(#[from] CommPError),

    #[error("failed to upload {kind} to storage node: {source}")]
    Storage {
        kind: FileKind,
        #[source]
        source: IpfsError,
    },
}

impl AppError {
    /// Pipeline stage the error came from
    pub fn stage(&self) -> &'static str {
        match self {
            AppError::MissingFile => "receive",
            AppError::SaveUpload(_) => "save_upload",
            AppError::Archive(_) => "build_archive",
            AppError::Commitment(_) => "compute_commitment",
            AppError::Storage {
                kind: FileKind::Archive,
                ..
            } => "upload_archive",
            AppError::Storage {
                kind: FileKind::Original,
                ..
            } => "upload_original",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingFile => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(stage = self.stage(), error = %self, "Upload failed");
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}
