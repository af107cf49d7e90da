//! Storage node client
//!
//! Pushes files to a Kubo-compatible `/api/v0/add` endpoint and turns the
//! returned content hash into gateway links.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tokio_util::io::ReaderStream;

use crate::config::IpfsConfig;
use crate::types::UploadResponse;

/// Which slot of the response an upload fills
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Original,
    Archive,
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileKind::Original => write!(f, "original file"),
            FileKind::Archive => write!(f, "CAR file"),
        }
    }
}

#[derive(Debug, Error)]
pub enum IpfsError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Request(#[from] reqwest::Error),

    #[error("storage node returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("unexpected add response: {0}")]
    MalformedResponse(String),
}

/// One line of the `/api/v0/add` NDJSON stream
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddResponse {
    #[serde(default)]
    pub name: String,
    pub hash: String,
    #[serde(default)]
    pub size: String,
}

/// HTTP client for the storage node
#[derive(Clone)]
pub struct IpfsClient {
    client: reqwest::Client,
    api_url: String,
    gateway_url: String,
}

impl IpfsClient {
    pub fn new(config: &IpfsConfig) -> Result<Self, IpfsError> {
        let mut builder = reqwest::Client::builder();
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }

        Ok(Self {
            client: builder.build()?,
            api_url: config.api_url.clone(),
            gateway_url: config.gateway_url.clone(),
        })
    }

    /// Gateway URL for a content hash
    pub fn gateway_link(&self, hash: &str) -> String {
        format!("{}/{}", self.gateway_url, hash)
    }

    /// Add the file at `path` and return the hash of the top-level pinned object
    pub async fn add_file(&self, path: &Path) -> Result<String, IpfsError> {
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();

        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let form = Form::new().part("", Part::stream_with_length(body, size).file_name(""));
        let url = format!("{}/api/v0/add", self.api_url);

        let response = self.client.post(&url).multipart(form).send().await?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(IpfsError::Status { status, body });
        }

        let body = response.text().await?;
        let added = parse_add_response(&body)?;

        tracing::debug!(
            path = %path.display(),
            size,
            hash = %added.hash,
            name = %added.name,
            node_size = %added.size,
            "Added file to storage node"
        );

        Ok(added.hash)
    }

    /// Add `path` and record its hash and link in the matching response slot
    pub async fn upload(
        &self,
        path: &Path,
        kind: FileKind,
        response: &mut UploadResponse,
    ) -> Result<(), IpfsError> {
        let hash = self.add_file(path).await?;
        self.record(kind, &hash, response);
        Ok(())
    }

    /// Original files fill `cid` and `link`; archives only `car_link`
    pub fn record(&self, kind: FileKind, hash: &str, response: &mut UploadResponse) {
        let link = self.gateway_link(hash);
        match kind {
            FileKind::Archive => response.car_link = link,
            FileKind::Original => {
                response.cid = hash.to_string();
                response.link = link;
            }
        }
    }
}

/// Pick the top-level object out of an `/api/v0/add` body.
///
/// The body is newline-delimited JSON, one object per added node, terminated
/// by a newline. The second-to-last segment describes the pinned top-level
/// object.
pub fn parse_add_response(body: &str) -> Result<AddResponse, IpfsError> {
    let parts: Vec<&str> = body.split('\n').collect();
    if parts.len() < 2 {
        return Err(IpfsError::MalformedResponse(body.to_string()));
    }

    let line = parts[parts.len() - 2];
    serde_json::from_str(line)
        .map_err(|e| IpfsError::MalformedResponse(format!("{}: {}", e, line)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> IpfsClient {
        IpfsClient::new(&IpfsConfig {
            api_url: "http://127.0.0.1:1".to_string(),
            gateway_url: "http://gw.local/ipfs".to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_parse_single_object() {
        let body = "{\"Name\":\"a.txt\",\"Hash\":\"QmLeaf\",\"Size\":\"18\"}\n";
        let added = parse_add_response(body).unwrap();
        assert_eq!(added.hash, "QmLeaf");
        assert_eq!(added.name, "a.txt");
    }

    #[test]
    fn test_parse_takes_second_to_last_line() {
        let body = concat!(
            "{\"Name\":\"dir/a\",\"Hash\":\"QmChild\",\"Size\":\"10\"}\n",
            "{\"Name\":\"dir\",\"Hash\":\"QmTop\",\"Size\":\"64\"}\n",
        );
        assert_eq!(parse_add_response(body).unwrap().hash, "QmTop");
    }

    #[test]
    fn test_parse_rejects_unterminated_body() {
        let err = parse_add_response("{\"Hash\":\"QmX\"}").unwrap_err();
        assert!(matches!(err, IpfsError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_add_response("not json\n").unwrap_err();
        assert!(matches!(err, IpfsError::MalformedResponse(_)));
    }

    #[test]
    fn test_record_fills_matching_slot() {
        let client = client();
        let mut response = UploadResponse::default();

        client.record(FileKind::Archive, "QmCar", &mut response);
        assert_eq!(response.car_link, "http://gw.local/ipfs/QmCar");
        assert!(response.cid.is_empty());

        client.record(FileKind::Original, "QmSrc", &mut response);
        assert_eq!(response.cid, "QmSrc");
        assert_eq!(response.link, "http://gw.local/ipfs/QmSrc");
        assert_eq!(response.car_link, "http://gw.local/ipfs/QmCar");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let err = client()
            .add_file(Path::new("/nonexistent/upload.car"))
            .await
            .unwrap_err();
        assert!(matches!(err, IpfsError::Io(_)));
    }

    #[tokio::test]
    async fn test_unreachable_node() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("f");
        tokio::fs::write(&path, b"data").await.unwrap();

        let err = client().add_file(&path).await.unwrap_err();
        assert!(matches!(err, IpfsError::Request(_)));
        assert!(!err.to_string().is_empty());
    }
}
