//! Packs a screen point into the single machine word a `PostThreadMessageW`
//! `LPARAM` gives us, the way mouse messages themselves arrive (`MAKEPOINTS`
//! semantics): low 16 bits = x, high 16 bits = y, each sign-extended from a
//! 16-bit value. Screen coordinates fit comfortably in `i16` range on every
//! display configuration Windows supports.

use windows::Win32::Foundation::LPARAM;

pub fn pack_point(x: i32, y: i32) -> LPARAM {
    let xs = x as i16 as u16 as isize;
    let ys = (y as i16 as u16 as isize) << 16;
    LPARAM(xs | ys)
}

pub fn unpack_point(lparam: LPARAM) -> (i32, i32) {
    let raw = lparam.0 as isize;
    let x = (raw & 0xFFFF) as u16 as i16 as i32;
    let y = ((raw >> 16) & 0xFFFF) as u16 as i16 as i32;
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_positive_coordinates() {
        let packed = pack_point(1200, 800);
        assert_eq!(unpack_point(packed), (1200, 800));
    }

    #[test]
    fn round_trips_negative_coordinates_from_multi_monitor_layouts() {
        let packed = pack_point(-500, -100);
        assert_eq!(unpack_point(packed), (-500, -100));
    }

    #[test]
    fn round_trips_origin() {
        let packed = pack_point(0, 0);
        assert_eq!(unpack_point(packed), (0, 0));
    }
}
