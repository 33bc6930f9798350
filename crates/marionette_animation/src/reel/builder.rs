use marionette_core::Result;

use super::Reel;
use super::format::{
    ASSET_KIND_ANIM, ClipRecord, REEL_SIGN, REEL_VERSION, ReelDescriptor, ReelHeader, encode_name,
};
use crate::pose::Pose;
use crate::settings::AnimationSettings;

/// Assembles a reel in memory and writes it in the binary `.h3da` layout.
///
/// ```rust,ignore
/// let mut b = ReelBuilder::new("walk", 30);
/// b.bind("root").bind("spine");
/// b.frame(vec![Pose::IDENTITY; 2]);
/// b.clip("walk", 0, 1, true);
/// let bytes = b.encode();
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReelBuilder {
    name: String,
    fps: u32,
    has_scale: bool,
    binds: Vec<String>,
    frames: Vec<Vec<Pose>>,
    clips: Vec<(String, u32, u32, bool)>,
}

impl ReelBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>, fps: u32) -> Self {
        Self {
            name: name.into(),
            fps,
            ..Default::default()
        }
    }

    pub fn has_scale(&mut self, has_scale: bool) -> &mut Self {
        self.has_scale = has_scale;
        self
    }

    /// Appends a pose binding; pose indices follow call order.
    pub fn bind(&mut self, name: impl Into<String>) -> &mut Self {
        self.binds.push(name.into());
        self
    }

    /// Appends a frame. Missing trailing poses are written as identity.
    pub fn frame(&mut self, poses: Vec<Pose>) -> &mut Self {
        self.frames.push(poses);
        self
    }

    pub fn clip(
        &mut self,
        name: impl Into<String>,
        start: u32,
        end: u32,
        looped: bool,
    ) -> &mut Self {
        self.clips.push((name.into(), start, end, looped));
        self
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let frame_count = self.frames.len();
        let header_size = size_of::<ReelHeader>();
        let desc_size = size_of::<ReelDescriptor>();
        let channel_size = 32 + frame_count * 2 * size_of::<[f32; 4]>();
        let clips_offset = header_size + desc_size + channel_size * self.binds.len();

        let mut out =
            Vec::with_capacity(clips_offset + self.clips.len() * size_of::<ClipRecord>());

        let header = ReelHeader {
            sign: REEL_SIGN,
            version: REEL_VERSION,
            kind: ASSET_KIND_ANIM,
            data_offset: header_size as u32,
        };
        out.extend_from_slice(bytemuck::bytes_of(&header));

        let desc = ReelDescriptor {
            fps: self.fps,
            frame_count: frame_count as u32,
            channel_count: self.binds.len() as u32,
            has_scale: u32::from(self.has_scale),
            clip_count: self.clips.len() as u32,
            clips_offset: clips_offset as u32,
        };
        out.extend_from_slice(bytemuck::bytes_of(&desc));

        for (pose_idx, bind) in self.binds.iter().enumerate() {
            out.extend_from_slice(&encode_name(bind));
            let pose_at = |frame: &Vec<Pose>| frame.get(pose_idx).copied().unwrap_or_default();
            for frame in &self.frames {
                out.extend_from_slice(bytemuck::bytes_of(&pose_at(frame).pos_scale.to_array()));
            }
            for frame in &self.frames {
                out.extend_from_slice(bytemuck::bytes_of(&pose_at(frame).rot.to_array()));
            }
        }

        for (name, start, end, looped) in &self.clips {
            let rec = ClipRecord {
                name: encode_name(name),
                start: *start,
                end: *end,
                looped: u32::from(*looped),
            };
            out.extend_from_slice(bytemuck::bytes_of(&rec));
        }
        out
    }

    /// Encodes and loads the result with default settings.
    pub fn build(&self) -> Result<Reel> {
        Reel::from_bytes(self.name.clone(), self.encode(), &AnimationSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    #[test]
    fn encode_then_load_preserves_fields() {
        let rot = Quat::from_rotation_z(0.3);
        let mut b = ReelBuilder::new("jump", 24);
        b.has_scale(true).bind("root").bind("head");
        b.frame(vec![Pose::new(Vec3::X, 2.0, rot), Pose::IDENTITY]);
        b.frame(vec![Pose::IDENTITY]);
        b.clip("jump", 0, 2, false);

        let reel = b.build().unwrap();
        let info = reel.info();
        assert_eq!(info.fps, 24);
        assert_eq!(info.frame_count, 2);
        assert_eq!(info.pose_count, 2);
        assert_eq!(info.clip_count, 1);
        assert!(info.has_scale);
        assert_eq!(reel.pose_bindings(), ["root", "head"]);

        let f0 = reel.frame(0).unwrap();
        assert_eq!(f0[0], Pose::new(Vec3::X, 2.0, rot));
        assert_eq!(reel.frame(1).unwrap()[1], Pose::IDENTITY);
        assert_eq!(reel.clip(0).unwrap().frame_end, 2);
    }
}
