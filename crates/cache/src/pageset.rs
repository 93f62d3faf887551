//! Packed page sets.
//!
//! All rendered pages of one source file are packed into a single blob so that
//! the set is written (and replaced) atomically. The layout is navigable: a
//! reader can get the page count from the fixed-size header alone, or seek
//! straight to one page using the index.
//!
//! ```text
//! +--------+---------+-----------+---------------------------+------------------+
//! | "QPGS" | version | count u32 | count × (offset, len) u64 | page bytes ...   |
//! +--------+---------+-----------+---------------------------+------------------+
//!   4 bytes   1 byte    LE          LE, offsets relative to
//!                                   the start of page bytes
//! ```
//!
//! Pages are contiguous and in page order (page 1 first). Anything else is
//! treated as corruption.

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use std::io::{Read, Seek, SeekFrom, Write};

const MAGIC: &[u8; 4] = b"QPGS";
const VERSION: u8 = 1;
const HEADER_LEN: u64 = 4 + 1 + 4;
const INDEX_ENTRY_LEN: u64 = 8 + 8;
// Don't let a corrupt count allocate gigabytes up front.
const MAX_PREALLOCATED_ENTRIES: usize = 1024;

/// Write `pages` (page 1 first) into `w` in the packed format.
///
/// Returns the number of bytes written.
pub fn pack<P: AsRef<[u8]>, W: Write + ?Sized>(pages: &[P], w: &mut W) -> Result<u64> {
    if pages.is_empty() {
        exn::bail!(ErrorKind::EmptyPageSet);
    }
    let count = u32::try_from(pages.len()).or_raise(|| ErrorKind::Corrupt("too many pages"))?;
    w.write_all(MAGIC).or_raise(|| ErrorKind::Io)?;
    w.write_all(&[VERSION]).or_raise(|| ErrorKind::Io)?;
    w.write_all(&count.to_le_bytes()).or_raise(|| ErrorKind::Io)?;
    let mut offset: u64 = 0;
    for page in pages {
        let len = page.as_ref().len() as u64;
        w.write_all(&offset.to_le_bytes()).or_raise(|| ErrorKind::Io)?;
        w.write_all(&len.to_le_bytes()).or_raise(|| ErrorKind::Io)?;
        offset += len;
    }
    for page in pages {
        w.write_all(page.as_ref()).or_raise(|| ErrorKind::Io)?;
    }
    w.flush().or_raise(|| ErrorKind::Io)?;
    Ok(HEADER_LEN + INDEX_ENTRY_LEN * u64::from(count) + offset)
}

/// Read only the page count from the header.
pub fn read_count<R: Read + ?Sized>(r: &mut R) -> Result<usize> {
    let mut header = [0u8; HEADER_LEN as usize];
    r.read_exact(&mut header).or_raise(|| ErrorKind::Corrupt("truncated header"))?;
    if &header[..4] != MAGIC {
        exn::bail!(ErrorKind::Corrupt("bad magic bytes"));
    }
    if header[4] != VERSION {
        exn::bail!(ErrorKind::Corrupt("unsupported format version"));
    }
    let count = u32::from_le_bytes([header[5], header[6], header[7], header[8]]);
    usize::try_from(count).or_raise(|| ErrorKind::Corrupt("page count overflows"))
}

/// Decoded header and index of a packed page set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageIndex {
    /// `(offset, len)` per page, offsets relative to `data_start`.
    entries: Vec<(u64, u64)>,
    data_start: u64,
}
impl PageIndex {
    /// Read and validate the header and index, leaving the reader positioned
    /// at the start of the page data.
    pub fn read_from<R: Read + ?Sized>(r: &mut R) -> Result<Self> {
        let count = read_count(r)?;
        let mut entries = Vec::with_capacity(count.min(MAX_PREALLOCATED_ENTRIES));
        let mut expected_offset: u64 = 0;
        for _ in 0..count {
            let mut offset = [0u8; 8];
            let mut len = [0u8; 8];
            r.read_exact(&mut offset).or_raise(|| ErrorKind::Corrupt("truncated index"))?;
            r.read_exact(&mut len).or_raise(|| ErrorKind::Corrupt("truncated index"))?;
            let (offset, len) = (u64::from_le_bytes(offset), u64::from_le_bytes(len));
            if offset != expected_offset {
                exn::bail!(ErrorKind::Corrupt("pages are not contiguous"));
            }
            expected_offset = offset.checked_add(len).ok_or_raise(|| ErrorKind::Corrupt("page too large"))?;
            entries.push((offset, len));
        }
        let data_start = HEADER_LEN + INDEX_ENTRY_LEN * entries.len() as u64;
        Ok(Self { entries, data_start })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Read a single page (1-indexed). Returns `None` for page numbers outside
    /// `1..=len()`.
    pub fn read_page<R: Read + Seek + ?Sized>(&self, r: &mut R, page: usize) -> Result<Option<Vec<u8>>> {
        let Some(&(offset, len)) = page.checked_sub(1).and_then(|i| self.entries.get(i)) else {
            return Ok(None);
        };
        r.seek(SeekFrom::Start(self.data_start + offset)).or_raise(|| ErrorKind::Io)?;
        read_exactly(r, len).map(Some)
    }

    /// Read every page in order. Assumes the reader is positioned at the start
    /// of page data (which is where [`read_from`](Self::read_from) leaves it).
    pub fn read_all<R: Read + ?Sized>(&self, r: &mut R) -> Result<Vec<Vec<u8>>> {
        self.entries.iter().map(|&(_, len)| read_exactly(r, len)).collect()
    }
}

fn read_exactly<R: Read + ?Sized>(r: &mut R, len: u64) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    r.take(len).read_to_end(&mut buffer).or_raise(|| ErrorKind::Io)?;
    if buffer.len() as u64 != len {
        exn::bail!(ErrorKind::Corrupt("truncated page data"));
    }
    Ok(buffer)
}
