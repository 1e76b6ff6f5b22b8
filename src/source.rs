//! Byte sources backing an open database.

use std::fs;
use std::io;

use filebuffer::FileBuffer;

use crate::error::{Error, Result};

/// Bytes behind a database handle: a memory-mapped view where mapping is
/// available, otherwise a plain file read positionally.
pub enum Source {
    Mapped(FileBuffer),
    File(fs::File),
}

impl Source {
    pub fn len(&self) -> io::Result<u64> {
        match self {
            Source::Mapped(map) => Ok(map.len() as u64),
            Source::File(file) => Ok(file.metadata()?.len()),
        }
    }

    /// Fills `buf` from the bytes starting at `pos`.
    ///
    /// The caller has already checked the range against the database size, so
    /// a short read means the file shrank underneath us and is reported as a
    /// format error, not an I/O error.
    pub fn read_exact_at(&self, buf: &mut [u8], pos: u32) -> Result<()> {
        match self {
            Source::Mapped(map) => {
                let pos = pos as usize;
                buf.copy_from_slice(&map[pos..pos + buf.len()]);
                Ok(())
            }
            Source::File(file) => read_file_at(file, buf, pos),
        }
    }
}

#[cfg(unix)]
fn read_file_at(file: &fs::File, buf: &mut [u8], pos: u32) -> Result<()> {
    use std::os::unix::fs::FileExt;

    file.read_exact_at(buf, u64::from(pos))
        .map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::Format("unexpected end of file"),
            _ => Error::Io(e),
        })
}

#[cfg(windows)]
fn read_file_at(file: &fs::File, buf: &mut [u8], pos: u32) -> Result<()> {
    use std::os::windows::fs::FileExt;

    let mut done = 0;
    while done < buf.len() {
        match file.seek_read(&mut buf[done..], u64::from(pos) + done as u64) {
            Ok(0) => return Err(Error::Format("unexpected end of file")),
            Ok(n) => done += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(())
}
