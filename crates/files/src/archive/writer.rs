use crate::archive::error::{ErrorKind, Result};
use exn::ResultExt;
use std::io::{Cursor, Write};
use tokio::task::spawn_blocking;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// An in-memory ZIP archive of stored (uncompressed) entries.
///
/// Writing is synchronous, so every step hands the writer to a blocking thread
/// and gets it back afterwards.
pub(crate) struct ArchiveWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    entries: usize,
}
impl ArchiveWriter {
    pub(crate) fn new() -> Self {
        Self { zip: ZipWriter::new(Cursor::new(Vec::new())), entries: 0 }
    }

    pub(crate) fn entries(&self) -> usize {
        self.entries
    }

    pub(crate) async fn append(self, name: String, data: Vec<u8>) -> Result<Self> {
        spawn_blocking(move || {
            let Self { mut zip, entries } = self;
            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Stored)
                .large_file(data.len() as u64 >= u64::from(u32::MAX));
            zip.start_file(name, options).or_raise(|| ErrorKind::Write)?;
            zip.write_all(&data).or_raise(|| ErrorKind::Write)?;
            Ok(Self { zip, entries: entries + 1 })
        })
        .await
        .or_raise(|| ErrorKind::Task)?
    }

    pub(crate) async fn finish(self) -> Result<Vec<u8>> {
        spawn_blocking(move || self.zip.finish().map(Cursor::into_inner).or_raise(|| ErrorKind::Write))
            .await
            .or_raise(|| ErrorKind::Task)?
    }
}
