//! Archive builder
//!
//! Turns an arbitrary file into a dense, deterministic CARv1: the file is
//! imported into a positional [`Filestore`], the whole DAG is walked from the
//! root, and every block is streamed into the archive exactly once.

pub mod filestore;
pub mod unixfs;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use cid::Cid;
use iroh_car::{CarHeader, CarWriter};
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufWriter};

pub use filestore::{Filestore, FilestoreReader, CHUNK_SIZE, LINKS_PER_NODE};

/// Upper bound on links followed while walking a DAG into an archive
pub const MAX_TRAVERSAL_LINKS: u64 = 32 * (1 << 20);

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to import file using unixfs from {}: {source}", path.display())]
    Import {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open filestore from {}: {source}", path.display())]
    OpenStore {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("block {0} not found in filestore")]
    MissingBlock(Cid),

    #[error("failed to read block {0}: {1}")]
    ReadBlock(Cid, #[source] std::io::Error),

    #[error("traversal exceeded the limit of {0} links")]
    TraversalLimit(u64),

    #[error("failed to write CAR to output file: {0}")]
    Write(#[from] std::io::Error),

    #[error("failed to write CAR to output file: {0}")]
    Car(#[from] iroh_car::Error),

    #[error("invalid multihash: {0}")]
    Multihash(#[from] multihash::Error),
}

/// Result of packing a file
#[derive(Debug, Clone)]
pub struct ArchiveSummary {
    /// Root CID of the imported DAG
    pub root: Cid,
    /// Blocks written to the archive
    pub blocks: usize,
}

/// Pack `input` into a CARv1 at `output`
pub async fn generate_car(input: &Path, output: &Path) -> Result<ArchiveSummary, ArchiveError> {
    let store = Filestore::import(input).await?;
    let root = store.root();

    let mut reader = store.open_read_only().await?;
    let file = tokio::fs::File::create(output).await?;
    let out = BufWriter::new(file);
    let blocks = write_dense_car(&mut reader, root, out, MAX_TRAVERSAL_LINKS).await?;

    tracing::debug!(
        input = %input.display(),
        output = %output.display(),
        root = %root,
        stored = store.len(),
        blocks,
        "Wrote CAR"
    );

    // The store and its reader drop here; nothing of the import outlives the call
    Ok(ArchiveSummary { root, blocks })
}

/// Walk the DAG under `root` depth-first and write every block once.
///
/// `max_links` bounds the links read from visited blocks. A repeated block is
/// not revisited, so links beneath it count only once. Returns the number of
/// blocks written.
pub async fn write_dense_car<W>(
    reader: &mut FilestoreReader<'_>,
    root: Cid,
    out: W,
    max_links: u64,
) -> Result<usize, ArchiveError>
where
    W: tokio::io::AsyncWrite + Send + Unpin,
{
    let mut writer = CarWriter::new(CarHeader::new_v1(vec![root]), out);
    let mut seen = HashSet::new();
    let mut stack = vec![root];
    let mut followed = 0u64;

    while let Some(cid) = stack.pop() {
        if !seen.insert(cid) {
            continue;
        }

        let block = reader.get(&cid).await?;
        writer.write(cid, &block).await?;

        let links = reader.links(&cid)?;
        followed += links.len() as u64;
        if followed > max_links {
            return Err(ArchiveError::TraversalLimit(max_links));
        }
        // Reverse so the first link is visited first
        stack.extend(links.iter().rev().copied());
    }

    let mut out = writer.finish().await?;
    out.flush().await?;

    Ok(seen.len())
}
