use std::cmp::max;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::hash::hash;
use crate::uint32;
use crate::HEADER_SIZE;

#[derive(Clone, Copy, Debug)]
struct HashPos {
    hash: u32,
    pos: u32,
}

impl HashPos {
    fn pack(&self, buf: &mut [u8]) {
        uint32::pack2(buf, self.hash, self.pos);
    }
}

/// Base interface for making a CDB file.
///
/// Records go straight to the given file; the hash tables and the header
/// are written by [`finish`](CdbMake::finish). An unfinished file is not a
/// valid database. For atomic replacement of a live file, use
/// [`CdbWriter`] instead.
///
/// # Example
///
/// ```no_run
/// fn main() -> constdb::Result<()> {
///     let file = std::fs::File::create("temporary.cdb")?;
///     let mut cdb = constdb::CdbMake::new(file)?;
///     cdb.add(b"one", b"Hello,")?;
///     cdb.add(b"two", b"world!")?;
///     cdb.finish()?;
///     Ok(())
/// }
/// ```
pub struct CdbMake {
    entries: Vec<Vec<HashPos>>,
    pos: u32,
    file: io::BufWriter<fs::File>,
    records: u32,
}

impl CdbMake {
    /// Creates a new CDB maker, reserving space for the header at the
    /// start of the file.
    pub fn new(file: fs::File) -> Result<CdbMake> {
        let mut w = io::BufWriter::new(file);
        let buf = [0; HEADER_SIZE as usize];
        w.seek(io::SeekFrom::Start(0))?;
        w.write_all(&buf)?;
        Ok(CdbMake {
            entries: vec![Vec::new(); 256],
            pos: HEADER_SIZE,
            file: w,
            records: 0,
        })
    }

    fn pos_plus(&mut self, len: u32) -> Result<()> {
        match self.pos.checked_add(len) {
            Some(pos) => {
                self.pos = pos;
                Ok(())
            }
            None => Err(Error::Capacity("file exceeds the 32-bit format limit")),
        }
    }

    fn add_begin(&mut self, keylen: u32, datalen: u32) -> Result<()> {
        let mut buf = [0; 8];
        uint32::pack2(&mut buf, keylen, datalen);
        self.file.write_all(&buf)?;
        Ok(())
    }

    fn add_end(&mut self, keylen: u32, datalen: u32, hash: u32) -> Result<()> {
        self.entries[(hash & 0xff) as usize].push(HashPos {
            hash,
            pos: self.pos,
        });
        self.pos_plus(8)?;
        self.pos_plus(keylen)?;
        self.pos_plus(datalen)?;
        self.records += 1;
        Ok(())
    }

    /// Adds a record to the CDB file. Records are kept in the order they
    /// are added, repeated keys included.
    pub fn add(&mut self, key: &[u8], data: &[u8]) -> Result<()> {
        if key.len() >= u32::MAX as usize || data.len() >= u32::MAX as usize {
            return Err(Error::Capacity("key or data exceeds the 32-bit length limit"));
        }
        self.add_begin(key.len() as u32, data.len() as u32)?;
        self.file.write_all(key)?;
        self.file.write_all(data)?;
        self.add_end(key.len() as u32, data.len() as u32, hash(key))
    }

    /// Adds each key/value pair produced by the iterator, in order.
    ///
    /// Stops at the first failing pair; records added before the failure
    /// stay in the file.
    pub fn add_many<I, K, V>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        for (key, data) in pairs {
            self.add(key.as_ref(), data.as_ref())?;
        }
        Ok(())
    }

    /// Returns the number of records added so far.
    pub fn num_records(&self) -> u32 {
        self.records
    }

    /// Sets the permissions on the underlying file.
    pub fn set_permissions(&self, perm: fs::Permissions) -> Result<()> {
        Ok(self.file.get_ref().set_permissions(perm)?)
    }

    /// Writes the hash tables and the header, then flushes and syncs the
    /// file so the database is durable before anything refers to it.
    pub fn finish(mut self) -> Result<()> {
        let mut buf = [0; 8];

        let maxsize = self.entries.iter().fold(1, |acc, e| max(acc, e.len() * 2));
        let count = self.entries.iter().fold(0, |acc, e| acc + e.len());
        if maxsize + count > (u32::MAX / 8) as usize {
            return Err(Error::Capacity("file exceeds the 32-bit format limit"));
        }

        // One scratch table serves all 256 buckets; slots are cleared as
        // they are written out.
        let mut table = vec![HashPos { hash: 0, pos: 0 }; maxsize];

        let mut header = [0; HEADER_SIZE as usize];
        for i in 0..256 {
            let len = self.entries[i].len() * 2;
            uint32::pack2(&mut header[i * 8..i * 8 + 8], self.pos, len as u32);

            for e in self.entries[i].iter() {
                let mut slot = (e.hash as usize >> 8) % len;
                while table[slot].pos != 0 {
                    slot += 1;
                    if slot == len {
                        slot = 0;
                    }
                }
                table[slot] = *e;
            }

            for hp in table.iter_mut().take(len) {
                hp.pack(&mut buf);
                self.file.write_all(&buf)?;
                *hp = HashPos { hash: 0, pos: 0 };
            }
            self.pos_plus(len as u32 * 8)?;
        }

        self.file.flush()?;
        self.file.seek(io::SeekFrom::Start(0))?;
        self.file.write_all(&header)?;
        self.file.flush()?;
        self.file.get_ref().sync_all()?;
        log::debug!("finished cdb: {} records in {} bytes", self.records, self.pos);
        Ok(())
    }
}

/// A CDB file writer which handles atomic updating.
///
/// Using this type, a CDB file is safely written by first creating a
/// temporary file, building the CDB structure into that temporary file,
/// and finally renaming that temporary file over the final file name.
/// Readers of the previous file are never disturbed. If the temporary
/// file is not properly finished (ie due to an error), it is deleted
/// when this writer is dropped.
///
/// # Example
///
/// ```no_run
/// use constdb::CdbWriter;
///
/// fn main() -> constdb::Result<()> {
///     let mut cdb = CdbWriter::create("data.cdb")?;
///     cdb.add(b"one", b"Hello")?;
///     cdb.finish()?;
///     Ok(())
/// }
/// ```
pub struct CdbWriter {
    dstname: PathBuf,
    tmpname: PathBuf,
    cdb: Option<CdbMake>,
    records: u32,
}

impl CdbWriter {
    /// Safely creates a new CDB file.
    ///
    /// The temporary file is the final name with `.tmp` appended.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<CdbWriter> {
        let path = path.as_ref();
        let mut tmpname = path.as_os_str().to_os_string();
        tmpname.push(".tmp");
        CdbWriter::with_filenames(path, PathBuf::from(tmpname))
    }

    /// Safely creates a new CDB file, using two specific file names.
    ///
    /// Note that the temporary file name must be on the same filesystem
    /// as the destination, or else the final rename will fail.
    pub fn with_filenames<P: AsRef<Path>, Q: AsRef<Path>>(path: P, tmpname: Q) -> Result<CdbWriter> {
        let file = fs::File::create(&tmpname)?;
        let cdb = CdbMake::new(file)?;
        log::debug!(
            "building cdb {} in {}",
            path.as_ref().display(),
            tmpname.as_ref().display()
        );
        Ok(CdbWriter {
            dstname: path.as_ref().to_path_buf(),
            tmpname: tmpname.as_ref().to_path_buf(),
            cdb: Some(cdb),
            records: 0,
        })
    }

    fn make(&mut self) -> Result<&mut CdbMake> {
        self.cdb.as_mut().ok_or(Error::Finished)
    }

    /// Adds a record to the CDB file.
    pub fn add(&mut self, key: &[u8], data: &[u8]) -> Result<()> {
        self.make()?.add(key, data)
    }

    /// Adds each key/value pair produced by the iterator, in order.
    pub fn add_many<I, K, V>(&mut self, pairs: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        self.make()?.add_many(pairs)
    }

    /// Returns the number of records added, which stays available after
    /// the file is finished.
    pub fn num_records(&self) -> u32 {
        self.cdb.as_ref().map_or(self.records, CdbMake::num_records)
    }

    /// Sets permissions on the temporary file.
    ///
    /// This must be done before the file is finished, as the temporary
    /// file will no longer exist at that point.
    pub fn set_permissions(&self, perm: fs::Permissions) -> Result<()> {
        self.cdb.as_ref().ok_or(Error::Finished)?.set_permissions(perm)
    }

    /// Finishes the temporary file and renames it over the final name.
    ///
    /// The rename only happens after the finished file has been synced to
    /// disk, so a reader always sees either the old complete database or
    /// the new one. Calling any method after a successful finish fails
    /// with [`Error::Finished`]. If finishing fails the temporary file is
    /// kept for inspection.
    pub fn finish(&mut self) -> Result<()> {
        let cdb = self.cdb.take().ok_or(Error::Finished)?;
        self.records = cdb.num_records();
        cdb.finish()?;
        fs::rename(&self.tmpname, &self.dstname)?;
        log::debug!("published cdb {}", self.dstname.display());
        Ok(())
    }
}

impl Drop for CdbWriter {
    fn drop(&mut self) {
        if self.cdb.is_some() && fs::remove_file(&self.tmpname).is_ok() {
            log::debug!("removed unfinished cdb {}", self.tmpname.display());
        }
    }
}
