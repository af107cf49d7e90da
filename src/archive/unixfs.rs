//! UnixFS file nodes
//!
//! Intermediate nodes of the balanced layout are dag-pb `PBNode`s whose links
//! point at child blocks and whose `Data` is a UnixFS `File` message. The
//! dag-pb envelope comes from `ipld-dagpb`; only the UnixFS `Data` fields are
//! written here.

use bytes::Bytes;
use cid::Cid;
use ipld_dagpb::{PbLink, PbNode};
use unsigned_varint::encode;

/// UnixFS `Data.DataType.File`
const UNIXFS_FILE: u64 = 2;

// UnixFS `Data` keys: (field << 3) | wire type
const UNIXFS_TYPE: u8 = 0x08;
const UNIXFS_FILESIZE: u8 = 0x18;
const UNIXFS_BLOCKSIZES: u8 = 0x20;

/// A link from a file node to one of its children
#[derive(Debug, Clone)]
pub struct FileLink {
    pub cid: Cid,
    /// Cumulative serialized size of the child subtree
    pub tsize: u64,
    /// File bytes covered by the child subtree
    pub filesize: u64,
}

/// Encode an intermediate UnixFS file node over `links`
pub fn encode_file_node(links: &[FileLink]) -> Vec<u8> {
    let node = PbNode {
        links: links
            .iter()
            .map(|link| PbLink {
                cid: link.cid,
                // Empty name, still present on the wire
                name: Some(String::new()),
                size: Some(link.tsize),
            })
            .collect(),
        data: Some(Bytes::from(encode_file_data(links))),
    };
    node.into_bytes()
}

fn encode_file_data(links: &[FileLink]) -> Vec<u8> {
    let filesize: u64 = links.iter().map(|l| l.filesize).sum();
    let mut buf = encode::u64_buffer();

    let mut data = Vec::new();
    data.push(UNIXFS_TYPE);
    data.extend_from_slice(encode::u64(UNIXFS_FILE, &mut buf));
    data.push(UNIXFS_FILESIZE);
    data.extend_from_slice(encode::u64(filesize, &mut buf));
    for link in links {
        data.push(UNIXFS_BLOCKSIZES);
        data.extend_from_slice(encode::u64(link.filesize, &mut buf));
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cids::{sha256_cid, RAW};

    // dag-pb keys: links are field 2, data is field 1
    const PB_NODE_LINKS: u8 = 0x12;
    const PB_NODE_DATA: u8 = 0x0a;

    #[test]
    fn test_file_node_layout() {
        let cid = sha256_cid(RAW, b"leaf").unwrap();
        let links = vec![
            FileLink { cid, tsize: 4, filesize: 4 },
            FileLink { cid, tsize: 4, filesize: 4 },
        ];
        let node = encode_file_node(&links);

        // Two links (36 byte CIDs) then the data field
        let link_len = 2 + 36 + 2 + 2;
        assert_eq!(node[0], PB_NODE_LINKS);
        assert_eq!(node[1] as usize, link_len);
        assert_eq!(node[2 + link_len], PB_NODE_LINKS);

        let data_at = 2 * (2 + link_len);
        assert_eq!(node[data_at], PB_NODE_DATA);
        // type=file, filesize=8, blocksizes=[4, 4]
        assert_eq!(
            &node[data_at + 2..],
            &[UNIXFS_TYPE, 2, UNIXFS_FILESIZE, 8, UNIXFS_BLOCKSIZES, 4, UNIXFS_BLOCKSIZES, 4]
        );
    }

    #[test]
    fn test_file_node_decodes() {
        let cid = sha256_cid(RAW, b"chunk").unwrap();
        let links = vec![FileLink { cid, tsize: 300, filesize: 1 << 20 }];
        let node = PbNode::from_bytes(Bytes::from(encode_file_node(&links))).unwrap();

        assert_eq!(node.links.len(), 1);
        assert_eq!(node.links[0].cid, cid);
        assert_eq!(node.links[0].name.as_deref(), Some(""));
        assert_eq!(node.links[0].size, Some(300));
        // filesize and blocksize of 1 MiB are three byte varints
        let expected = [
            UNIXFS_TYPE, 2, UNIXFS_FILESIZE, 0x80, 0x80, 0x40, UNIXFS_BLOCKSIZES, 0x80, 0x80, 0x40,
        ];
        assert_eq!(node.data.unwrap().as_ref(), &expected);
    }
}
