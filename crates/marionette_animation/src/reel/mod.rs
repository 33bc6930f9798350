//! Reel: immutable keyframe container
//!
//! A reel holds the sampled motion of one skeleton or node hierarchy:
//! a fixed frame rate, `frame_count` frames of `pose_count` local poses, the
//! bind name of every pose index, and named clips (frame ranges with a loop
//! flag).
//!
//! Frames are stored frame-major in one flat buffer so that sampling a frame
//! touches a single contiguous run of poses.
//!
//! Reels are immutable after load and shared through `Arc<Reel>` by every
//! controller instance bound to them (see [`crate::library::ReelLibrary`]).

mod builder;
pub mod format;
mod loader;

pub use builder::ReelBuilder;

use marionette_core::NameHash;
use rustc_hash::FxHashMap;

use crate::pose::{Pose, blend_poses};

/// A named frame range `[frame_start, frame_end)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReelClip {
    pub name: String,
    pub frame_start: u32,
    pub frame_end: u32,
    pub looped: bool,
    /// `(frame_end - frame_start) * frame_time`
    pub duration: f32,
}

impl ReelClip {
    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> u32 {
        self.frame_end - self.frame_start
    }
}

/// Summary of a reel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReelInfo {
    pub fps: u32,
    pub frame_count: u32,
    pub duration: f32,
    pub frame_time: f32,
    pub pose_count: usize,
    pub clip_count: usize,
    pub has_scale: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipInfo<'a> {
    pub name: &'a str,
    pub looped: bool,
    pub duration: f32,
}

#[derive(Debug)]
pub struct Reel {
    name: String,
    fps: u32,
    frame_count: u32,
    frame_time: f32,
    duration: f32,
    has_scale: bool,
    binds: Vec<String>,
    /// `frame_count * pose_count` poses, frame-major.
    poses: Vec<Pose>,
    clips: Vec<ReelClip>,
    clip_lookup: FxHashMap<NameHash, u32>,
}

impl Reel {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn info(&self) -> ReelInfo {
        ReelInfo {
            fps: self.fps,
            frame_count: self.frame_count,
            duration: self.duration,
            frame_time: self.frame_time,
            pose_count: self.pose_count(),
            clip_count: self.clips.len(),
            has_scale: self.has_scale,
        }
    }

    #[inline]
    #[must_use]
    pub fn pose_count(&self) -> usize {
        self.binds.len()
    }

    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    #[inline]
    #[must_use]
    pub fn frame_time(&self) -> f32 {
        self.frame_time
    }

    #[inline]
    #[must_use]
    pub fn has_scale(&self) -> bool {
        self.has_scale
    }

    #[inline]
    #[must_use]
    pub fn clips(&self) -> &[ReelClip] {
        &self.clips
    }

    #[inline]
    #[must_use]
    pub fn clip(&self, index: usize) -> Option<&ReelClip> {
        self.clips.get(index)
    }

    #[must_use]
    pub fn clip_info(&self, index: usize) -> Option<ClipInfo<'_>> {
        self.clips.get(index).map(|c| ClipInfo {
            name: &c.name,
            looped: c.looped,
            duration: c.duration,
        })
    }

    /// Clip index by name. With duplicate names the first clip wins.
    #[must_use]
    pub fn find_clip(&self, name: &str) -> Option<usize> {
        self.find_clip_hashed(NameHash::of(name))
    }

    #[must_use]
    pub fn find_clip_hashed(&self, hash: NameHash) -> Option<usize> {
        self.clip_lookup.get(&hash).map(|&i| i as usize)
    }

    #[inline]
    #[must_use]
    pub fn pose_binding(&self, pose_index: usize) -> Option<&str> {
        self.binds.get(pose_index).map(String::as_str)
    }

    #[inline]
    #[must_use]
    pub fn pose_bindings(&self) -> &[String] {
        &self.binds
    }

    /// Linear search over bind names.
    #[must_use]
    pub fn find_pose_binding(&self, name: &str) -> Option<usize> {
        self.binds.iter().position(|b| b == name)
    }

    /// All poses of one frame.
    #[must_use]
    pub fn frame(&self, index: usize) -> Option<&[Pose]> {
        let n = self.pose_count();
        let start = index.checked_mul(n)?;
        self.poses.get(start..start.checked_add(n)?)
    }

    /// Interpolates clip `clip_index` at `local_time` seconds into `out`.
    ///
    /// Looped clips wrap from the last frame to the first; non-looped clips
    /// hold the last frame. Returns `false` (and leaves `out` untouched) for
    /// an invalid clip index.
    pub fn sample_clip(&self, clip_index: usize, local_time: f32, out: &mut [Pose]) -> bool {
        let Some(clip) = self.clips.get(clip_index) else {
            return false;
        };

        let ft = self.frame_time;
        let count = clip.frame_count() as usize;
        let idx = ((local_time / ft).floor().max(0.0) as usize).min(count - 1);
        let next = if clip.looped {
            (idx + 1) % count
        } else {
            (idx + 1).min(count - 1)
        };
        let t = ((local_time - idx as f32 * ft) / ft).clamp(0.0, 1.0);

        let base = clip.frame_start as usize;
        match (self.frame(base + idx), self.frame(base + next)) {
            (Some(a), Some(b)) => {
                blend_poses(out, a, b, t);
                true
            }
            _ => false,
        }
    }

    /// Copies frame `index` into `out` without interpolation.
    pub fn sample_frame(&self, index: usize, out: &mut [Pose]) -> bool {
        match self.frame(index) {
            Some(src) => {
                let n = out.len().min(src.len());
                out[..n].copy_from_slice(&src[..n]);
                true
            }
            None => false,
        }
    }
}
