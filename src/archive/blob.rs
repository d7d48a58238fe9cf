//! Archive blob file format
//!
//! One file per archive, `archive_<uuid>.evar`, self-describing enough to be
//! decoded without the index:
//!
//! ```text
//! magic      8 bytes   "EVARCHV1"
//! header     u32 LE length + JSON {archiveId, createdAt, strategy, itemCount}
//! item*      u8  algorithm tag
//!            u64 LE original size
//!            u64 LE compressed size
//!            u16 LE event id length + UTF-8 event id
//!            compressed bytes
//! ```

use std::io::{self, Read, Write};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ArchiveStrategy, CompressionAlgorithm};

const MAGIC: &[u8; 8] = b"EVARCHV1";
pub const BLOB_EXTENSION: &str = "evar";
const BLOB_PREFIX: &str = "archive_";
/// Upper bound on the JSON header; anything larger is treated as corruption
const MAX_HEADER_LEN: u32 = 1024 * 1024;

/// Deterministic file name for an archive id
pub fn blob_file_name(archive_id: Uuid) -> String {
    format!("{}{}.{}", BLOB_PREFIX, archive_id, BLOB_EXTENSION)
}

/// Inverse of [`blob_file_name`]
pub fn parse_blob_file_name(name: &str) -> Option<Uuid> {
    let stem = name
        .strip_prefix(BLOB_PREFIX)?
        .strip_suffix(BLOB_EXTENSION)?
        .strip_suffix('.')?;
    Uuid::parse_str(stem).ok()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobHeader {
    pub archive_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub strategy: ArchiveStrategy,
    pub item_count: u64,
}

/// One compressed event inside a blob
#[derive(Debug, Clone, PartialEq)]
pub struct BlobItem {
    pub event_id: String,
    pub algorithm: CompressionAlgorithm,
    pub original_size: u64,
    pub data: Vec<u8>,
}

impl BlobItem {
    pub fn compressed_size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveBlob {
    pub header: BlobHeader,
    pub items: Vec<BlobItem>,
}

impl ArchiveBlob {
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(MAGIC)?;

        let header = serde_json::to_vec(&self.header)?;
        let header_len = u32::try_from(header.len())
            .map_err(|_| invalid_data("blob header too large"))?;
        writer.write_all(&header_len.to_le_bytes())?;
        writer.write_all(&header)?;

        for item in &self.items {
            let id = item.event_id.as_bytes();
            let id_len =
                u16::try_from(id.len()).map_err(|_| invalid_data("event id too long"))?;

            writer.write_all(&[item.algorithm.tag()])?;
            writer.write_all(&item.original_size.to_le_bytes())?;
            writer.write_all(&item.compressed_size().to_le_bytes())?;
            writer.write_all(&id_len.to_le_bytes())?;
            writer.write_all(id)?;
            writer.write_all(&item.data)?;
        }

        Ok(())
    }

    /// Read a complete blob; any structural damage is an `InvalidData` error.
    pub fn read_from<R: Read>(mut reader: R) -> io::Result<Self> {
        let header = Self::read_header(&mut reader)?;

        let mut items = Vec::new();
        for _ in 0..header.item_count {
            items.push(read_item(&mut reader)?);
        }

        let mut trailing = [0u8; 1];
        if reader.read(&mut trailing)? != 0 {
            return Err(invalid_data("trailing bytes after last item"));
        }

        Ok(Self { header, items })
    }

    /// Read only the magic and header
    pub fn read_header<R: Read>(reader: &mut R) -> io::Result<BlobHeader> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(invalid_data("not an archive blob"));
        }

        let header_len = read_u32(reader)?;
        if header_len > MAX_HEADER_LEN {
            return Err(invalid_data("blob header length out of range"));
        }
        let mut header = vec![0u8; header_len as usize];
        reader.read_exact(&mut header)?;

        serde_json::from_slice(&header).map_err(|e| invalid_data(&e.to_string()))
    }
}

fn read_item<R: Read>(reader: &mut R) -> io::Result<BlobItem> {
    let mut tag = [0u8; 1];
    reader.read_exact(&mut tag)?;
    let algorithm = CompressionAlgorithm::from_tag(tag[0])
        .ok_or_else(|| invalid_data(&format!("unknown algorithm tag {}", tag[0])))?;

    let original_size = read_u64(reader)?;
    let compressed_size = read_u64(reader)?;

    let id_len = read_u16(reader)?;
    let mut id = vec![0u8; usize::from(id_len)];
    reader.read_exact(&mut id)?;
    let event_id = String::from_utf8(id).map_err(|_| invalid_data("event id is not UTF-8"))?;

    // take() instead of a pre-sized buffer: a corrupt length must not allocate
    let mut data = Vec::new();
    reader.take(compressed_size).read_to_end(&mut data)?;
    if data.len() as u64 != compressed_size {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "item data truncated",
        ));
    }

    Ok(BlobItem {
        event_id,
        algorithm,
        original_size,
        data,
    })
}

fn read_u16<R: Read>(reader: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn invalid_data(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob() -> ArchiveBlob {
        let items = vec![
            BlobItem {
                event_id: "evt-1".into(),
                algorithm: CompressionAlgorithm::Gzip,
                original_size: 120,
                data: vec![1, 2, 3, 4],
            },
            BlobItem {
                event_id: "evt-2".into(),
                algorithm: CompressionAlgorithm::None,
                original_size: 2,
                data: b"{}".to_vec(),
            },
        ];
        ArchiveBlob {
            header: BlobHeader {
                archive_id: Uuid::new_v4(),
                created_at: Utc::now(),
                strategy: ArchiveStrategy::Hybrid,
                item_count: items.len() as u64,
            },
            items,
        }
    }

    #[test]
    fn test_write_then_read() {
        let blob = blob();
        let mut bytes = Vec::new();
        blob.write_to(&mut bytes).unwrap();

        let read = ArchiveBlob::read_from(bytes.as_slice()).unwrap();
        assert_eq!(read, blob);
    }

    #[test]
    fn test_header_only() {
        let blob = blob();
        let mut bytes = Vec::new();
        blob.write_to(&mut bytes).unwrap();

        let header = ArchiveBlob::read_header(&mut bytes.as_slice()).unwrap();
        assert_eq!(header, blob.header);
    }

    #[test]
    fn test_truncated_blob_is_rejected() {
        let mut bytes = Vec::new();
        blob().write_to(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 1);

        assert!(ArchiveBlob::read_from(bytes.as_slice()).is_err());
    }

    #[test]
    fn test_foreign_file_is_rejected() {
        let err = ArchiveBlob::read_from(&b"PK\x03\x04 zip file here"[..]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_file_names() {
        let id = Uuid::new_v4();
        let name = blob_file_name(id);
        assert!(name.starts_with("archive_"));
        assert!(name.ends_with(".evar"));
        assert_eq!(parse_blob_file_name(&name), Some(id));
        assert_eq!(parse_blob_file_name("archive_index.json"), None);
        assert_eq!(parse_blob_file_name("archive_not-a-uuid.evar"), None);
    }
}
