//! Archive sinks

use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Error, Result};

/// Collects `(path, bytes)` entries and turns them into one blob.
///
/// `finish` runs on a blocking thread, so it may do CPU-heavy work.
pub trait ArchiveSink: Send + 'static {
    fn add_entry(&mut self, path: &str, bytes: Vec<u8>) -> Result<()>;

    fn entry_count(&self) -> usize;

    /// File extension of the produced artifact, without the dot.
    fn extension(&self) -> &'static str;

    fn finish(self) -> Result<Vec<u8>>
    where
        Self: Sized;
}

/// Deflate-compressed zip, entries written in key order.
///
/// Keys ending in `/` become directory entries.
#[derive(Debug)]
pub struct ZipArchiveSink {
    entries: BTreeMap<String, Vec<u8>>,
    level: i64,
}

impl Default for ZipArchiveSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ZipArchiveSink {
    pub fn new() -> Self {
        Self::with_level(6)
    }

    pub fn with_level(level: i64) -> Self {
        Self {
            entries: BTreeMap::new(),
            level: level.clamp(0, 9),
        }
    }
}

impl ArchiveSink for ZipArchiveSink {
    fn add_entry(&mut self, path: &str, bytes: Vec<u8>) -> Result<()> {
        self.entries.insert(path.to_string(), bytes);
        Ok(())
    }

    fn entry_count(&self) -> usize {
        self.entries.len()
    }

    fn extension(&self) -> &'static str {
        "zip"
    }

    fn finish(self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(self.level));

        for (path, bytes) in self.entries {
            if path.ends_with('/') {
                writer
                    .add_directory(path.as_str(), options)
                    .map_err(|e| Error::Finalize(format!("{}: {}", path, e)))?;
                continue;
            }
            writer
                .start_file(path.as_str(), options)
                .map_err(|e| Error::Finalize(format!("{}: {}", path, e)))?;
            writer
                .write_all(&bytes)
                .map_err(|e| Error::Finalize(format!("{}: {}", path, e)))?;
        }

        let cursor = writer.finish().map_err(|e| Error::Finalize(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}
