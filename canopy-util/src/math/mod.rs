pub mod position;

/// Converts a world coordinate to the corresponding chunk coordinate.
pub const fn get_section_cord(coord: i32) -> i32 {
    coord >> 4
}

pub const fn get_local_cord(cord: i32) -> i32 {
    cord & 15
}
