//! Positional-reference block store
//!
//! Importing a file chunks it into raw leaves and builds a balanced UnixFS DAG
//! over them. Leaf bytes are never copied into the store: each leaf records the
//! `(offset, len)` of its chunk in the source file and is re-read on demand
//! through a [`FilestoreReader`]. Only the (small) intermediate dag-pb nodes
//! are held inline.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use cid::Cid;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::unixfs::{encode_file_node, FileLink};
use super::ArchiveError;
use crate::cids::{sha256_cid, DAG_PB, RAW};

/// Fixed chunker size: 1 MiB
pub const CHUNK_SIZE: usize = 1 << 20;

/// Maximum links per intermediate node in the balanced layout
pub const LINKS_PER_NODE: usize = 1024;

#[derive(Debug)]
enum BlockSource {
    Positional { offset: u64, len: usize },
    Inline(Vec<u8>),
}

#[derive(Debug)]
struct Entry {
    source: BlockSource,
    links: Vec<Cid>,
}

/// DAG built over a source file, addressed by CID
#[derive(Debug)]
pub struct Filestore {
    source: PathBuf,
    blocks: HashMap<Cid, Entry>,
    root: Cid,
}

impl Filestore {
    /// Chunk `path` and build its UnixFS DAG
    pub async fn import(path: &Path) -> Result<Self, ArchiveError> {
        let import_err = |source| ArchiveError::Import {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).await.map_err(import_err)?;
        let mut blocks = HashMap::new();
        let mut level = Vec::new();
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut offset = 0u64;

        loop {
            let n = read_chunk(&mut file, &mut buf).await.map_err(import_err)?;
            // An empty file still produces one (empty) leaf
            if n == 0 && !level.is_empty() {
                break;
            }

            let cid = sha256_cid(RAW, &buf[..n])?;
            blocks.entry(cid).or_insert(Entry {
                source: BlockSource::Positional { offset, len: n },
                links: Vec::new(),
            });
            level.push(FileLink {
                cid,
                tsize: n as u64,
                filesize: n as u64,
            });
            offset += n as u64;

            if n < CHUNK_SIZE {
                break;
            }
        }

        while level.len() > 1 {
            let mut parents = Vec::with_capacity(level.len().div_ceil(LINKS_PER_NODE));
            for children in level.chunks(LINKS_PER_NODE) {
                let node = encode_file_node(children);
                let cid = sha256_cid(DAG_PB, &node)?;
                let parent = FileLink {
                    cid,
                    tsize: node.len() as u64 + children.iter().map(|c| c.tsize).sum::<u64>(),
                    filesize: children.iter().map(|c| c.filesize).sum(),
                };
                blocks.entry(cid).or_insert(Entry {
                    source: BlockSource::Inline(node),
                    links: children.iter().map(|c| c.cid).collect(),
                });
                parents.push(parent);
            }
            level = parents;
        }

        let root = level[0].cid;

        tracing::debug!(
            path = %path.display(),
            size = offset,
            blocks = blocks.len(),
            root = %root,
            "Imported file into filestore"
        );

        Ok(Self {
            source: path.to_path_buf(),
            blocks,
            root,
        })
    }

    /// Root of the imported DAG
    pub fn root(&self) -> Cid {
        self.root
    }

    /// Number of distinct blocks
    pub(crate) fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Open the store for reading block bytes
    pub async fn open_read_only(&self) -> Result<FilestoreReader<'_>, ArchiveError> {
        let file = File::open(&self.source)
            .await
            .map_err(|source| ArchiveError::OpenStore {
                path: self.source.clone(),
                source,
            })?;
        Ok(FilestoreReader { store: self, file })
    }
}

/// Read handle over a [`Filestore`]
pub struct FilestoreReader<'a> {
    store: &'a Filestore,
    file: File,
}

impl FilestoreReader<'_> {
    /// Child links of a block (empty for leaves)
    pub fn links(&self, cid: &Cid) -> Result<&[Cid], ArchiveError> {
        self.entry(cid).map(|e| e.links.as_slice())
    }

    /// Block bytes, read back from the source file for positional leaves
    pub async fn get(&mut self, cid: &Cid) -> Result<Vec<u8>, ArchiveError> {
        let store = self.store;
        match &store.entry(cid)?.source {
            BlockSource::Inline(bytes) => Ok(bytes.clone()),
            BlockSource::Positional { offset, len } => {
                let mut data = vec![0u8; *len];
                self.file
                    .seek(SeekFrom::Start(*offset))
                    .await
                    .map_err(|e| ArchiveError::ReadBlock(*cid, e))?;
                self.file
                    .read_exact(&mut data)
                    .await
                    .map_err(|e| ArchiveError::ReadBlock(*cid, e))?;
                Ok(data)
            }
        }
    }

    fn entry(&self, cid: &Cid) -> Result<&Entry, ArchiveError> {
        self.store.entry(cid)
    }
}

impl Filestore {
    fn entry(&self, cid: &Cid) -> Result<&Entry, ArchiveError> {
        self.blocks.get(cid).ok_or(ArchiveError::MissingBlock(*cid))
    }
}

/// Fill `buf` from `file`, returning fewer bytes only at EOF
async fn read_chunk(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write_file(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        tokio::fs::write(&path, data).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_small_file_root_is_raw_leaf() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "small.txt", b"0123456789").await;

        let store = Filestore::import(&path).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.root(), sha256_cid(RAW, b"0123456789").unwrap());

        let mut reader = store.open_read_only().await.unwrap();
        assert_eq!(reader.get(&store.root()).await.unwrap(), b"0123456789");
        assert!(reader.links(&store.root()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "empty", b"").await;

        let store = Filestore::import(&path).await.unwrap();
        assert_eq!(store.root(), sha256_cid(RAW, b"").unwrap());
    }

    #[tokio::test]
    async fn test_multi_chunk_file_builds_dag_pb_root() {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..CHUNK_SIZE * 2 + 17).map(|i| (i % 251) as u8).collect();
        let path = write_file(&dir, "big.bin", &data).await;

        let store = Filestore::import(&path).await.unwrap();
        let root = store.root();
        assert_eq!(root.codec(), DAG_PB);
        // three leaves + one root
        assert_eq!(store.len(), 4);

        let mut reader = store.open_read_only().await.unwrap();
        let links = reader.links(&root).unwrap().to_vec();
        assert_eq!(links.len(), 3);

        let mut reassembled = Vec::new();
        for link in &links {
            reassembled.extend(reader.get(link).await.unwrap());
        }
        assert_eq!(reassembled, data);
    }

    #[tokio::test]
    async fn test_repeated_chunks_are_stored_once() {
        let dir = TempDir::new().unwrap();
        let data = vec![7u8; CHUNK_SIZE * 3];
        let path = write_file(&dir, "repeat.bin", &data).await;

        let store = Filestore::import(&path).await.unwrap();
        // one distinct leaf + root
        assert_eq!(store.len(), 2);
        let reader = store.open_read_only().await.unwrap();
        assert_eq!(reader.links(&store.root()).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_import_missing_file() {
        let err = Filestore::import(Path::new("/nonexistent/input")).await.unwrap_err();
        assert!(matches!(err, ArchiveError::Import { .. }));
    }
}
