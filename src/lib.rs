//! This crate provides support for reading and writing
//! [CDB](https://cr.yp.to/cdb.html) files. A CDB is a "constant
//! database" that acts as an on-disk associative array mapping keys to
//! values, allowing multiple values for each key. It provides for fast
//! lookups and low overheads. A constant database has no provision for
//! updating, only rewriting from scratch.
//!
//! Lookups never fail with "not found": a missing key just produces an
//! empty iterator from [`Cdb::find`] and `None` from [`Cdb::get`]. The
//! [`Error`] type covers I/O problems, malformed files, and misuse of a
//! writer.
//!
//! # Examples
//!
//! Reading a set of records:
//!
//! ```no_run
//! let cdb = constdb::Cdb::open("data.cdb").unwrap();
//!
//! for result in cdb.find(b"one") {
//!     println!("{:?}", result.unwrap());
//! }
//! ```
//!
//! Creating a database with safe atomic updating:
//!
//! ```no_run
//! fn main() -> constdb::Result<()> {
//!     let mut cdb = constdb::CdbWriter::create("data.cdb")?;
//!     cdb.add(b"one", b"Hello, ")?;
//!     cdb.add(b"one", b"world!\n")?;
//!     cdb.add(b"two", &[1, 2, 3, 4])?;
//!     cdb.finish()?;
//!     Ok(())
//! }
//! ```
//!
//! # References
//!
//!  * [D. J. Bernstein's original software](https://cr.yp.to/cdb.html)
//!  * [Constant Database (cdb) Internals](https://www.unixuser.org/~euske/doc/cdbinternals/index.html)
//!  * [Wikipedia](https://en.wikipedia.org/wiki/Cdb_(software))

mod error;
mod hash;
mod reader;
mod source;
mod uint32;
mod writer;

/// Size of the table-of-contents header at the start of every CDB file.
pub(crate) const HEADER_SIZE: u32 = 2048;

pub use crate::error::{Error, Result};
pub use crate::hash::hash;
pub use crate::reader::{Cdb, KeyIter, RecordIter, ValueIter};
pub use crate::writer::{CdbMake, CdbWriter};
