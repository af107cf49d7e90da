//! Multiformat helpers shared by the archive builder and the commP calculator

use cid::Cid;
use multibase::Base;
use multihash::Multihash;
use sha2::{Digest, Sha256};

/// Multicodec: raw binary
pub const RAW: u64 = 0x55;

/// Multicodec: MerkleDAG protobuf
pub const DAG_PB: u64 = 0x70;

/// Multicodec: Filecoin unsealed piece commitment
pub const FIL_COMMITMENT_UNSEALED: u64 = 0xf101;

/// Multihash: sha2-256
pub const SHA2_256: u64 = 0x12;

/// Multihash: sha2-256 with the top two bits of the last byte cleared
pub const SHA2_256_TRUNC254_PADDED: u64 = 0x1012;

/// Build a CIDv1 from an already computed digest
pub fn cid_from_digest(
    codec: u64,
    hash_code: u64,
    digest: &[u8],
) -> Result<Cid, multihash::Error> {
    let mh = Multihash::<64>::wrap(hash_code, digest)?;
    Ok(Cid::new_v1(codec, mh))
}

/// Hash `data` with sha2-256 and wrap it in a CIDv1 of the given codec
pub fn sha256_cid(codec: u64, data: &[u8]) -> Result<Cid, multihash::Error> {
    cid_from_digest(codec, SHA2_256, &Sha256::digest(data))
}

/// Lowercase base32 multibase form (`b...`)
pub fn to_base32(cid: &Cid) -> String {
    multibase::encode(Base::Base32Lower, cid.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_cid_prefix() {
        let cid = sha256_cid(RAW, b"hello").unwrap();
        assert_eq!(cid.codec(), RAW);
        assert!(to_base32(&cid).starts_with("bafkrei"));
    }

    #[test]
    fn test_dag_pb_cid_prefix() {
        let cid = sha256_cid(DAG_PB, b"node").unwrap();
        assert!(to_base32(&cid).starts_with("bafybei"));
    }

    #[test]
    fn test_piece_cid_prefix() {
        let cid =
            cid_from_digest(FIL_COMMITMENT_UNSEALED, SHA2_256_TRUNC254_PADDED, &[0u8; 32]).unwrap();
        assert!(to_base32(&cid).starts_with("baga6ea4seaq"));
    }

    #[test]
    fn test_base32_matches_default_display() {
        let cid = sha256_cid(RAW, b"display").unwrap();
        assert_eq!(to_base32(&cid), cid.to_string());
    }
}
