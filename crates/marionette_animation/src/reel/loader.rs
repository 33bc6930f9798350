use std::io;
use std::path::Path;

use marionette_core::memory::{check_budget, checked_bytes, try_vec_filled, try_vec_with_capacity};
use marionette_core::{FileSource, MarionetteError, NameHash, Result, VirtualFile};
use rustc_hash::FxHashMap;

use super::format::{
    ASSET_KIND_ANIM, ClipRecord, NAME_LEN, REEL_SIGN, REEL_VERSION, ReelDescriptor, ReelHeader,
    decode_name,
};
use super::{Reel, ReelClip};
use crate::pose::Pose;
use crate::settings::AnimationSettings;

impl Reel {
    /// Loads a `.h3da` reel through `source`. The reel is named after the
    /// file stem of `path`.
    pub fn load(source: &dyn FileSource, path: &str, settings: &AnimationSettings) -> Result<Self> {
        let file = source.open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => MarionetteError::load(path, "could not open file"),
            _ => MarionetteError::IoError(e),
        })?;
        let name = Path::new(path)
            .file_stem()
            .map_or_else(|| path.to_owned(), |s| s.to_string_lossy().into_owned());
        Self::read(file, name, settings)
    }

    /// Parses a reel from an in-memory `.h3da` image.
    pub fn from_bytes(
        name: impl Into<String>,
        bytes: impl Into<std::sync::Arc<[u8]>>,
        settings: &AnimationSettings,
    ) -> Result<Self> {
        let name = name.into();
        let file = VirtualFile::new(name.clone(), bytes);
        Self::read(file, name, settings)
    }

    fn read(mut f: VirtualFile, name: String, settings: &AnimationSettings) -> Result<Self> {
        let path = f.path().to_owned();
        let truncated = |e: io::Error| MarionetteError::format(&path, format!("truncated: {e}"));

        let header: ReelHeader = f.read_pod().map_err(truncated)?;
        if header.sign != REEL_SIGN || header.kind != ASSET_KIND_ANIM {
            return Err(MarionetteError::format(&path, "invalid file format"));
        }
        if header.version != REEL_VERSION {
            return Err(MarionetteError::format(
                &path,
                format!("invalid file version {:#x}", header.version),
            ));
        }

        f.seek_to(u64::from(header.data_offset)).map_err(truncated)?;
        let desc: ReelDescriptor = f.read_pod().map_err(truncated)?;
        if desc.fps == 0 {
            return Err(MarionetteError::format(&path, "fps must be positive"));
        }
        if desc.frame_count == 0 {
            return Err(MarionetteError::format(&path, "reel has no frames"));
        }

        let frame_count = desc.frame_count as usize;
        let pose_count = desc.channel_count as usize;
        let clip_count = desc.clip_count as usize;

        // Exact arena size for binds, frames and the clip table.
        let pose_total = frame_count
            .checked_mul(pose_count)
            .ok_or_else(|| MarionetteError::out_of_memory(&path, usize::MAX))?;
        let bytes = checked_bytes(&path, pose_total, size_of::<Pose>())?
            .saturating_add(NAME_LEN * pose_count)
            .saturating_add(clip_count * size_of::<ReelClip>());
        check_budget(&path, bytes, settings.max_asset_bytes)?;

        let mut binds = try_vec_with_capacity(pose_count, &path)?;
        let mut poses = try_vec_filled(pose_total, Pose::IDENTITY, &path)?;

        for pose_idx in 0..pose_count {
            let raw: [u8; NAME_LEN] = f.read_pod().map_err(truncated)?;
            binds.push(decode_name(&raw));

            let pos_scale: Vec<[f32; 4]> = f.read_pod_vec(frame_count).map_err(truncated)?;
            let rot: Vec<[f32; 4]> = f.read_pod_vec(frame_count).map_err(truncated)?;

            // File stores one run per channel; transpose into frame-major.
            for (frame, (p, r)) in pos_scale.iter().zip(&rot).enumerate() {
                let pose = &mut poses[frame * pose_count + pose_idx];
                pose.pos_scale = glam::Vec4::from_array(*p);
                pose.rot = glam::Quat::from_array(*r);
            }
        }

        let frame_time = 1.0 / desc.fps as f32;
        let mut clips = try_vec_with_capacity(clip_count, &path)?;
        let mut clip_lookup = FxHashMap::default();
        clip_lookup.reserve(clip_count);

        f.seek_to(u64::from(desc.clips_offset)).map_err(truncated)?;
        let records: Vec<ClipRecord> = f.read_pod_vec(clip_count).map_err(truncated)?;
        for (i, rec) in records.iter().enumerate() {
            let clip_name = decode_name(&rec.name);
            if rec.start >= rec.end || rec.end > desc.frame_count {
                return Err(MarionetteError::format(
                    &path,
                    format!(
                        "clip '{clip_name}' has invalid frame range [{}, {}) for {} frames",
                        rec.start, rec.end, desc.frame_count
                    ),
                ));
            }
            clip_lookup.entry(NameHash::of(&clip_name)).or_insert(i as u32);
            clips.push(ReelClip {
                name: clip_name,
                frame_start: rec.start,
                frame_end: rec.end,
                looped: rec.looped != 0,
                duration: frame_time * (rec.end - rec.start) as f32,
            });
        }

        log::debug!(
            "Loaded reel '{name}': {} fps, {frame_count} frames, {pose_count} poses, {clip_count} clips",
            desc.fps
        );

        Ok(Self {
            name,
            fps: desc.fps,
            frame_count: desc.frame_count,
            frame_time,
            duration: frame_time * frame_count as f32,
            has_scale: desc.has_scale != 0,
            binds,
            poses,
            clips,
            clip_lookup,
        })
    }
}
