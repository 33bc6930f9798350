//! On-disk records of the binary reel (`.h3da`) format.
//!
//! All records are little-endian and packed without padding:
//!
//! ```text
//! ReelHeader        @ 0
//! ReelDescriptor    @ header.data_offset
//! channel_count x {
//!     name: [u8; 32]
//!     pos_scale: frame_count x [f32; 4]
//!     rotation:  frame_count x [f32; 4]   (x, y, z, w)
//! }
//! ClipRecord        @ descriptor.clips_offset, clip_count times
//! ```

use bytemuck::{Pod, Zeroable};

pub const REEL_SIGN: u32 = 0x0068_3364;
pub const REEL_VERSION: u32 = 0x0031_2E31;
pub const ASSET_KIND_ANIM: u32 = 2;

pub const NAME_LEN: usize = 32;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ReelHeader {
    pub sign: u32,
    pub version: u32,
    pub kind: u32,
    pub data_offset: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ReelDescriptor {
    pub fps: u32,
    pub frame_count: u32,
    pub channel_count: u32,
    pub has_scale: u32,
    pub clip_count: u32,
    pub clips_offset: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ClipRecord {
    pub name: [u8; NAME_LEN],
    pub start: u32,
    pub end: u32,
    pub looped: u32,
}

/// Decodes a NUL-padded name field.
pub fn decode_name(raw: &[u8; NAME_LEN]) -> String {
    let len = raw.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
    String::from_utf8_lossy(&raw[..len]).into_owned()
}

/// Encodes a name into a NUL-padded field, truncating to 31 bytes.
pub fn encode_name(name: &str) -> [u8; NAME_LEN] {
    let mut raw = [0u8; NAME_LEN];
    let mut len = name.len().min(NAME_LEN - 1);
    while !name.is_char_boundary(len) {
        len -= 1;
    }
    raw[..len].copy_from_slice(&name.as_bytes()[..len]);
    raw
}
