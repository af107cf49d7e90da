//! Piece commitment (commP) calculation
//!
//! The archive is Fr32-padded, split into 32-byte leaves and folded into a
//! binary Merkle tree whose node hash is SHA-256 with the top two bits of the
//! last byte cleared. The tree is completed with zero subtrees up to the next
//! power of two, and never below one padded quad ([`MIN_PIECE_SIZE`]).

pub mod fr32;

use std::io::Read;
use std::path::{Path, PathBuf};

use cid::Cid;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::cids::{cid_from_digest, FIL_COMMITMENT_UNSEALED, SHA2_256_TRUNC254_PADDED};
use fr32::{pad_quad, padded_size, unpadded_size, PADDED_QUAD, UNPADDED_QUAD};

/// Smallest piece produced: one padded quad
pub const MIN_PIECE_SIZE: u64 = PADDED_QUAD as u64;

/// Padded size of one full read buffer
const BUF_PIECE_SIZE: u64 = 16 << 20;

/// Read buffer size: the unpadded bytes of a 16 MiB piece
pub const COMMP_BUF_SIZE: usize = (BUF_PIECE_SIZE - BUF_PIECE_SIZE / 128) as usize;

const NODE_SIZE: usize = 32;

type Node = [u8; NODE_SIZE];

#[derive(Debug, Error)]
pub enum CommPError {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("copy into commp writer: {0}")]
    Copy(#[source] std::io::Error),

    #[error("computing commP failed: {0}")]
    Finalize(String),

    #[error("failed to stat {}: {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("commP task failed: {0}")]
    Task(String),
}

/// Finalized piece commitment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceInfo {
    pub piece_cid: Cid,
    /// Unpadded capacity of the piece
    pub unpadded_size: u64,
    /// Raw bytes consumed
    pub payload_size: u64,
}

impl PieceInfo {
    /// Padded piece size (power of two)
    pub fn piece_size(&self) -> u64 {
        padded_size(self.unpadded_size)
    }
}

/// Streaming commP accumulator
pub struct CommPAccumulator {
    pending: Vec<u8>,
    /// `levels[i]` holds a finished left subtree of height `i` awaiting its sibling
    levels: Vec<Option<Node>>,
    leaves: u64,
    payload_size: u64,
}

impl Default for CommPAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl CommPAccumulator {
    pub fn new() -> Self {
        Self {
            pending: Vec::with_capacity(UNPADDED_QUAD),
            levels: Vec::new(),
            leaves: 0,
            payload_size: 0,
        }
    }

    /// Feed raw (unpadded) bytes
    pub fn update(&mut self, mut data: &[u8]) {
        self.payload_size += data.len() as u64;

        if !self.pending.is_empty() {
            let take = (UNPADDED_QUAD - self.pending.len()).min(data.len());
            self.pending.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.pending.len() < UNPADDED_QUAD {
                return;
            }
            let quad = std::mem::take(&mut self.pending);
            self.push_quad(&quad);
        }

        let mut quads = data.chunks_exact(UNPADDED_QUAD);
        for quad in &mut quads {
            self.push_quad(quad);
        }
        self.pending.extend_from_slice(quads.remainder());
    }

    /// Complete the tree and produce the piece CID
    pub fn finish(mut self) -> Result<PieceInfo, CommPError> {
        if !self.pending.is_empty() {
            let mut quad = std::mem::take(&mut self.pending);
            quad.resize(UNPADDED_QUAD, 0);
            self.push_quad(&quad);
        }

        let piece_size = piece_size_for(self.payload_size);
        let height = (piece_size / NODE_SIZE as u64).trailing_zeros() as usize;
        let zeros = zero_subtrees(height);

        let root = self.fold(height, &zeros);
        let piece_cid = cid_from_digest(FIL_COMMITMENT_UNSEALED, SHA2_256_TRUNC254_PADDED, &root)
            .map_err(|e| CommPError::Finalize(e.to_string()))?;

        Ok(PieceInfo {
            piece_cid,
            unpadded_size: unpadded_size(piece_size),
            payload_size: self.payload_size,
        })
    }

    fn push_quad(&mut self, quad: &[u8]) {
        let mut input = [0u8; UNPADDED_QUAD];
        input.copy_from_slice(quad);
        let mut padded = [0u8; PADDED_QUAD];
        pad_quad(&input, &mut padded);

        for leaf in padded.chunks_exact(NODE_SIZE) {
            let mut node = [0u8; NODE_SIZE];
            node.copy_from_slice(leaf);
            self.push_leaf(node);
        }
    }

    fn push_leaf(&mut self, mut node: Node) {
        self.leaves += 1;
        let mut level = 0;
        loop {
            if self.levels.len() == level {
                self.levels.push(None);
            }
            match self.levels[level].take() {
                Some(left) => {
                    node = hash_pair(&left, &node);
                    level += 1;
                }
                None => {
                    self.levels[level] = Some(node);
                    return;
                }
            }
        }
    }

    /// Close every open subtree against zero siblings up to `height`
    fn fold(&mut self, height: usize, zeros: &[Node]) -> Node {
        if self.leaves == 0 {
            return zeros[height];
        }

        let mut carry: Option<Node> = None;
        for (level, zero) in zeros.iter().enumerate().take(height) {
            let left = self.levels.get_mut(level).and_then(Option::take);
            carry = match (left, carry) {
                (Some(left), Some(right)) => Some(hash_pair(&left, &right)),
                (Some(left), None) => Some(hash_pair(&left, zero)),
                (None, Some(left)) => Some(hash_pair(&left, zero)),
                (None, None) => None,
            };
        }

        match carry {
            Some(root) => root,
            // Leaf count was exactly the piece width
            None => self
                .levels
                .get_mut(height)
                .and_then(Option::take)
                .unwrap_or(zeros[height]),
        }
    }
}

/// Padded piece size for a payload of `len` bytes
pub fn piece_size_for(len: u64) -> u64 {
    let quads = len.div_ceil(UNPADDED_QUAD as u64).max(1);
    let padded = padded_size(quads * UNPADDED_QUAD as u64);
    padded.next_power_of_two().max(MIN_PIECE_SIZE)
}

/// Node hash: SHA-256 truncated to 254 bits
fn hash_pair(left: &Node, right: &Node) -> Node {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    let mut out: Node = hasher.finalize().into();
    out[NODE_SIZE - 1] &= 0x3f;
    out
}

/// `zeros[i]` is the root of an all-zero subtree of height `i`
fn zero_subtrees(height: usize) -> Vec<Node> {
    let mut zeros = Vec::with_capacity(height + 1);
    zeros.push([0u8; NODE_SIZE]);
    for i in 0..height {
        let next = hash_pair(&zeros[i], &zeros[i]);
        zeros.push(next);
    }
    zeros
}

/// Stream a file through the accumulator. Blocking.
pub fn compute_file(path: &Path) -> Result<PieceInfo, CommPError> {
    let mut file = std::fs::File::open(path).map_err(|source| CommPError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut acc = CommPAccumulator::new();
    let mut buf = vec![0u8; COMMP_BUF_SIZE];
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(CommPError::Copy(e)),
        };
        acc.update(&buf[..n]);
    }

    acc.finish()
}

/// Piece commitment plus the archive's on-disk size
#[derive(Debug, Clone)]
pub struct Commitment {
    pub piece: PieceInfo,
    pub file_size: u64,
}

/// Compute commP for the file at `path` off the async runtime
pub async fn compute(path: &Path) -> Result<Commitment, CommPError> {
    let owned = path.to_path_buf();
    let piece = tokio::task::spawn_blocking(move || compute_file(&owned))
        .await
        .map_err(|e| CommPError::Task(e.to_string()))??;

    let file_size = tokio::fs::metadata(path)
        .await
        .map_err(|source| CommPError::Stat {
            path: path.to_path_buf(),
            source,
        })?
        .len();

    Ok(Commitment { piece, file_size })
}
