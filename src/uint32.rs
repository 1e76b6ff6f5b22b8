//! Little-endian u32 packing, the only codec the CDB format needs.
//!
//! Header entries, sub-table slots and record length prefixes are all pairs
//! of little-endian u32 values; `pack2`/`unpack2` handle those 8-byte cells.

pub fn pack(buf: &mut [u8], v: u32) {
    buf[..4].copy_from_slice(&v.to_le_bytes());
}

pub fn pack2(buf: &mut [u8], a: u32, b: u32) {
    pack(&mut buf[..4], a);
    pack(&mut buf[4..8], b);
}

pub fn unpack(buf: &[u8]) -> u32 {
    u32::from_le_bytes(buf[..4].try_into().unwrap())
}

pub fn unpack2(buf: &[u8]) -> (u32, u32) {
    (unpack(&buf[..4]), unpack(&buf[4..8]))
}
