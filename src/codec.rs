//! Big-endian integer accessors for chain memory.
//!
//! Every number persisted inside a chain (positions, block sizes,
//! container fields) goes through these functions, so a chain image is
//! byte-identical across hosts. Signed values use two's-complement bit
//! patterns of the matching width. Caller-facing types stay host-native.

use byteorder::{BigEndian, ByteOrder};
use std::slice;

macro_rules! be_accessors {
    ($read:ident, $write:ident, $ty:ty, $width:literal, $get:ident, $put:ident) => {
        /// Read a big-endian value from `addr`.
        ///
        /// # Safety
        /// `addr` must be valid for reads of the value's width.
        #[must_use]
        pub unsafe fn $read(addr: *const u8) -> $ty {
            let bytes = unsafe { slice::from_raw_parts(addr, $width) };
            BigEndian::$get(bytes)
        }

        /// Write a value to `addr` in big-endian byte order.
        ///
        /// # Safety
        /// `addr` must be valid for writes of the value's width.
        pub unsafe fn $write(addr: *mut u8, value: $ty) {
            let bytes = unsafe { slice::from_raw_parts_mut(addr, $width) };
            BigEndian::$put(bytes, value);
        }
    };
}

be_accessors!(read_u16, write_u16, u16, 2, read_u16, write_u16);
be_accessors!(read_u32, write_u32, u32, 4, read_u32, write_u32);
be_accessors!(read_u64, write_u64, u64, 8, read_u64, write_u64);
be_accessors!(read_i16, write_i16, i16, 2, read_i16, write_i16);
be_accessors!(read_i32, write_i32, i32, 4, read_i32, write_i32);
be_accessors!(read_i64, write_i64, i64, 8, read_i64, write_i64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u64_round_trip() {
        let mut buf = [0u8; 8];
        unsafe {
            write_u64(buf.as_mut_ptr(), 0x0102_0304_0506_0708);
        }
        // Big-endian: most significant byte first.
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(unsafe { read_u64(buf.as_ptr()) }, 0x0102_0304_0506_0708);
    }

    #[test]
    fn sentinel_is_all_ones() {
        let mut buf = [0u8; 8];
        unsafe {
            write_u64(buf.as_mut_ptr(), u64::MAX);
        }
        assert_eq!(buf, [0xff; 8]);
    }

    #[test]
    fn signed_uses_twos_complement() {
        let mut buf = [0u8; 4];
        unsafe {
            write_i32(buf.as_mut_ptr(), -2);
        }
        assert_eq!(buf, [0xff, 0xff, 0xff, 0xfe]);
        assert_eq!(unsafe { read_i32(buf.as_ptr()) }, -2);
    }

    #[test]
    fn narrow_widths() {
        let mut buf = [0u8; 2];
        unsafe {
            write_u16(buf.as_mut_ptr(), 0xBEEF);
        }
        assert_eq!(buf, [0xBE, 0xEF]);
        assert_eq!(unsafe { read_u16(buf.as_ptr()) }, 0xBEEF);

        let mut buf = [0u8; 4];
        unsafe {
            write_u32(buf.as_mut_ptr(), 0xDEAD_BEEF);
        }
        assert_eq!(unsafe { read_u32(buf.as_ptr()) }, 0xDEAD_BEEF);
    }
}
