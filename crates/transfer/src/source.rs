use std::io::SeekFrom;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::TransferError;
use crate::filetype::detect_content_type;

/// Where a file's bytes come from.
///
/// Reads are positional, so units can be fetched independently and in any
/// order (hashing reads them sequentially, resumed uploads skip around).
#[derive(Debug, Clone)]
pub enum ByteSource {
    /// A file on disk, reopened for every read.
    File(PathBuf),
    /// An in-memory buffer.
    Memory(Arc<[u8]>),
}

impl ByteSource {
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::Memory(Arc::from(data.into()))
    }

    /// Reads exactly `range` from the source.
    pub async fn read_range(&self, range: Range<u64>) -> Result<Vec<u8>, TransferError> {
        let len = range.end.saturating_sub(range.start);
        match self {
            Self::File(path) => {
                let mut file = tokio::fs::File::open(path).await?;
                file.seek(SeekFrom::Start(range.start)).await?;
                let mut buf = vec![0u8; len as usize];
                file.read_exact(&mut buf).await?;
                Ok(buf)
            }
            Self::Memory(data) => {
                let total = data.len() as u64;
                if range.start > range.end || range.end > total {
                    return Err(TransferError::OutOfRange {
                        start: range.start,
                        end: range.end,
                        len: total,
                    });
                }
                Ok(data[range.start as usize..range.end as usize].to_vec())
            }
        }
    }
}

/// A file submitted for upload: identity plus its byte source.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    pub data: ByteSource,
}

impl SourceFile {
    /// Describes an on-disk file, reading its size and guessing its type.
    pub async fn from_path(path: &Path) -> Result<Self, TransferError> {
        let meta = tokio::fs::metadata(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            mime_type: detect_content_type(&name).to_string(),
            name,
            size: meta.len(),
            data: ByteSource::File(path.to_path_buf()),
        })
    }

    /// Wraps an in-memory buffer.
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        let data: Vec<u8> = data.into();
        Self {
            mime_type: detect_content_type(&name).to_string(),
            size: data.len() as u64,
            name,
            data: ByteSource::from_bytes(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(data).unwrap();
        path
    }

    #[tokio::test]
    async fn file_range_reads() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "test.bin", b"0123456789");
        let source = ByteSource::File(path);

        assert_eq!(source.read_range(0..4).await.unwrap(), b"0123");
        assert_eq!(source.read_range(6..10).await.unwrap(), b"6789");
        assert!(source.read_range(8..12).await.is_err());
    }

    #[tokio::test]
    async fn memory_range_reads() {
        let source = ByteSource::from_bytes(b"AABBCCDDEE".to_vec());
        assert_eq!(source.read_range(8..10).await.unwrap(), b"EE");
        assert_eq!(source.read_range(3..3).await.unwrap(), b"");
        assert!(matches!(
            source.read_range(8..11).await,
            Err(TransferError::OutOfRange { len: 10, .. })
        ));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let source = ByteSource::File(dir.path().join("gone.bin"));
        assert!(matches!(
            source.read_range(0..1).await,
            Err(TransferError::Io(_))
        ));
    }

    #[tokio::test]
    async fn source_file_from_path() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "cover.PNG", b"png!");
        let file = SourceFile::from_path(&path).await.unwrap();
        assert_eq!(file.name, "cover.PNG");
        assert_eq!(file.size, 4);
        assert_eq!(file.mime_type, "image/png");
    }

    #[test]
    fn source_file_from_bytes() {
        let file = SourceFile::from_bytes("notes.txt", b"hi".to_vec());
        assert_eq!(file.size, 2);
        assert_eq!(file.mime_type, "text/plain");
    }
}
