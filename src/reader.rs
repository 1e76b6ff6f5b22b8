use std::fs;
use std::path::Path;

use filebuffer::FileBuffer;

use crate::error::{Error, Result};
use crate::hash::hash;
use crate::source::Source;
use crate::uint32;
use crate::HEADER_SIZE;

const KEYCHUNK: usize = 32;

/// CDB file reader
///
/// # Example
///
/// ```no_run
/// let cdb = constdb::Cdb::open("lookup.cdb").unwrap();
/// for result in cdb.find(b"key") {
///     println!("{:?}", result.unwrap());
/// }
/// ```
pub struct Cdb {
    source: Source,
    size: u32,
    eod: u32,
}

impl Cdb {
    /// Opens the named file and returns the CDB reader.
    ///
    /// The file is memory mapped when the platform allows it, with a
    /// fallback to plain positional reads.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Cdb> {
        let source = match FileBuffer::open(&path) {
            Ok(map) => Source::Mapped(map),
            Err(_) => Source::File(fs::File::open(&path)?),
        };
        Cdb::from_source(source)
    }

    /// Returns a CDB reader over an already-open file, using positional
    /// reads instead of a memory map.
    pub fn init(file: fs::File) -> Result<Cdb> {
        Cdb::from_source(Source::File(file))
    }

    fn from_source(source: Source) -> Result<Cdb> {
        let len = source.len()?;
        if len < u64::from(HEADER_SIZE) {
            return Err(Error::Format("file too small to hold a header"));
        }
        if len > u64::from(u32::MAX) {
            return Err(Error::Format("file exceeds the 32-bit format limit"));
        }
        let cdb = Cdb {
            source,
            size: len as u32,
            eod: HEADER_SIZE,
        };
        let mut buf = [0; 4];
        cdb.read_at(&mut buf, 0)?;
        let eod = uint32::unpack(&buf);
        if eod < HEADER_SIZE || eod > cdb.size {
            return Err(Error::Format("record section boundary out of range"));
        }
        log::trace!("opened cdb: {} bytes, records end at {}", cdb.size, eod);
        Ok(Cdb { eod, ..cdb })
    }

    fn read_at(&self, buf: &mut [u8], pos: u32) -> Result<()> {
        if u64::from(pos) + buf.len() as u64 > u64::from(self.size) {
            return Err(Error::Format("read past end of file"));
        }
        self.source.read_exact_at(buf, pos)
    }

    /// Copies `len` bytes starting at the absolute file position `pos`, as
    /// returned by [`ValueIter::next_location`].
    pub fn read_raw(&self, pos: u32, len: u32) -> Result<Vec<u8>> {
        let mut buf = vec![0; len as usize];
        self.read_at(&mut buf, pos)?;
        Ok(buf)
    }

    // Reads the header entry for khash and returns the table position, its
    // slot count, and the position of the initial probe slot.
    fn hash_table(&self, khash: u32) -> Result<(u32, u32, u32)> {
        let mut buf = [0; 8];
        self.read_at(&mut buf, (khash & 0xff) * 8)?;
        let (hpos, hslots) = uint32::unpack2(&buf);
        if hslots == 0 {
            return Ok((hpos, 0, 0));
        }
        if u64::from(hpos) + u64::from(hslots) * 8 > u64::from(self.size) {
            return Err(Error::Format("hash table extends past end of file"));
        }
        let kpos = hpos + ((khash >> 8) % hslots) * 8;
        Ok((hpos, hslots, kpos))
    }

    // Compares the key against the file contents at pos, a chunk at a time,
    // so long keys need no allocation.
    fn match_key(&self, key: &[u8], mut pos: u32) -> Result<bool> {
        let mut buf = [0; KEYCHUNK];
        for chunk in key.chunks(KEYCHUNK) {
            let buf = &mut buf[..chunk.len()];
            self.read_at(buf, pos)?;
            if buf != chunk {
                return Ok(false);
            }
            pos += chunk.len() as u32;
        }
        Ok(true)
    }

    // Decodes the length prefix at pos and checks that the whole record
    // lies inside the record section. Returns the key and data lengths and
    // the position of the following record.
    fn record_at(&self, pos: u32) -> Result<(u32, u32, u32)> {
        let mut buf = [0; 8];
        self.read_at(&mut buf, pos)?;
        let (klen, dlen) = uint32::unpack2(&buf);
        let end = u64::from(pos) + 8 + u64::from(klen) + u64::from(dlen);
        if end > u64::from(self.eod) {
            return Err(Error::Format("record extends past the record section"));
        }
        Ok((klen, dlen, end as u32))
    }

    /// Finds all records with the named key. The returned iterator produces
    /// each value stored under the key, in the order the records were added.
    ///
    /// A missing key is not an error; the iterator is simply empty.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// let cdb = constdb::Cdb::open("lookup.cdb").unwrap();
    ///
    /// for result in cdb.find(b"one") {
    ///     println!("{:?}", result.unwrap());
    /// }
    /// ```
    pub fn find(&self, key: &[u8]) -> ValueIter<'_> {
        ValueIter::new(self, key)
    }

    /// Returns the value of the first record with the named key, or `None`
    /// when the key is absent.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.find(key).next().transpose()
    }

    /// Tests for the presence of a key without copying any data.
    pub fn contains_key(&self, key: &[u8]) -> Result<bool> {
        Ok(self.find(key).next_location()?.is_some())
    }

    /// Counts the records by walking the record section.
    pub fn num_records(&self) -> Result<u32> {
        let mut count = 0;
        let mut pos = HEADER_SIZE;
        while pos < self.eod {
            let (_, _, next) = self.record_at(pos)?;
            pos = next;
            count += 1;
        }
        Ok(count)
    }

    /// Iterates over every record in the order it appears in the file,
    /// repeated keys included.
    pub fn iter(&self) -> RecordIter<'_> {
        RecordIter {
            cdb: self,
            pos: HEADER_SIZE,
        }
    }

    /// Iterates over the distinct keys, each at its first occurrence.
    pub fn keys(&self) -> KeyIter<'_> {
        KeyIter {
            cdb: self,
            pos: HEADER_SIZE,
        }
    }
}

/// Iterator over the values of every record sharing one key.
///
/// Holds the live state of a single lookup: each step probes one slot of
/// the key's hash table and stops for good at the first empty slot.
pub struct ValueIter<'a> {
    cdb: &'a Cdb,
    key: Vec<u8>,
    khash: u32,
    table: Option<(u32, u32)>,
    kpos: u32,
    kloop: u32,
}

impl<'a> ValueIter<'a> {
    fn new(cdb: &'a Cdb, key: &[u8]) -> ValueIter<'a> {
        ValueIter {
            cdb,
            key: key.to_vec(),
            khash: hash(key),
            table: None,
            kpos: 0,
            kloop: 0,
        }
    }

    /// Advances to the next record matching the key and returns the
    /// position and length of its value, without copying it. Returns
    /// `Ok(None)` once the key has no further records.
    pub fn next_location(&mut self) -> Result<Option<(u32, u32)>> {
        let (hpos, hslots) = match self.table {
            Some(table) => table,
            None => {
                let (hpos, hslots, kpos) = self.cdb.hash_table(self.khash)?;
                self.table = Some((hpos, hslots));
                self.kpos = kpos;
                (hpos, hslots)
            }
        };
        let mut buf = [0; 8];
        while self.kloop < hslots {
            self.cdb.read_at(&mut buf, self.kpos)?;
            let (shash, rpos) = uint32::unpack2(&buf);
            if rpos == 0 {
                // Empty slot: no further records for this key. Park the
                // counter so later calls stay exhausted without re-probing.
                self.kloop = hslots;
                return Ok(None);
            }
            self.kloop += 1;
            self.kpos += 8;
            if self.kpos == hpos + hslots * 8 {
                self.kpos = hpos;
            }
            if shash != self.khash {
                continue;
            }
            self.cdb.read_at(&mut buf, rpos)?;
            let (klen, dlen) = uint32::unpack2(&buf);
            if klen as usize == self.key.len() && self.cdb.match_key(&self.key, rpos + 8)? {
                return Ok(Some((rpos + 8 + klen, dlen)));
            }
        }
        Ok(None)
    }
}

impl Iterator for ValueIter<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_location() {
            Ok(Some((dpos, dlen))) => Some(self.cdb.read_raw(dpos, dlen)),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

/// Iterator over every record in the file, in on-disk order.
///
/// After the last record it yields `None` and rewinds, so the same value
/// can run another full pass.
pub struct RecordIter<'a> {
    cdb: &'a Cdb,
    pos: u32,
}

impl RecordIter<'_> {
    fn read_record(&mut self) -> Result<(Vec<u8>, Vec<u8>)> {
        let (klen, dlen, next) = self.cdb.record_at(self.pos)?;
        let key = self.cdb.read_raw(self.pos + 8, klen)?;
        let data = self.cdb.read_raw(self.pos + 8 + klen, dlen)?;
        self.pos = next;
        Ok((key, data))
    }
}

impl Iterator for RecordIter<'_> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.cdb.eod {
            self.pos = HEADER_SIZE;
            return None;
        }
        Some(self.read_record())
    }
}

/// Iterator over the distinct keys, in order of first occurrence.
///
/// Each record's key is looked up again through the hash table and yielded
/// only when the lookup lands back on that record, which holds exactly for
/// the first record of a key. That costs one probe sequence per record but
/// needs no memory of the keys already seen.
pub struct KeyIter<'a> {
    cdb: &'a Cdb,
    pos: u32,
}

impl KeyIter<'_> {
    // Consumes one record; Ok(Some) yields its key, Ok(None) skips a
    // repeated key.
    fn step(&mut self) -> Result<Option<Vec<u8>>> {
        let (klen, _, next) = self.cdb.record_at(self.pos)?;
        let key = self.cdb.read_raw(self.pos + 8, klen)?;
        let dpos = self.pos + 8 + klen;
        self.pos = next;
        match self.cdb.find(&key).next_location()? {
            Some((found, _)) if found == dpos => Ok(Some(key)),
            Some(_) => Ok(None),
            None => Err(Error::Format("record not reachable through its hash table")),
        }
    }
}

impl Iterator for KeyIter<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.cdb.eod {
            match self.step() {
                Ok(Some(key)) => return Some(Ok(key)),
                Ok(None) => {}
                Err(err) => return Some(Err(err)),
            }
        }
        None
    }
}
