//! Response types

use serde::{Deserialize, Serialize};

/// Identifiers and links produced by one upload.
///
/// Filled in stage by stage; only ever returned once every stage succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Storage node hash of the original file
    pub cid: String,
    /// Gateway link to the original file
    pub link: String,
    /// Gateway link to the CAR
    pub car_link: String,
    /// Root CID of the file's DAG (base32)
    pub payload_cid: String,
    /// Piece commitment CID (base32)
    pub comm_p_cid: String,
    /// Padded piece size in bytes
    pub piece_size: u64,
    /// CAR size on disk in bytes
    pub car_file_size: u64,
}
