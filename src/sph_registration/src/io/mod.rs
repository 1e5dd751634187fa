//! Point cloud files.

pub mod ply;

pub use ply::{read_ply, read_ply_from, write_ply, write_ply_to, PlyWriter};
