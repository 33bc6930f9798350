//! Joint Poses
//!
//! Packed local transforms as stored in a reel, with the interpolation and
//! conversion used by the evaluator.

use bytemuck::{Pod, Zeroable};
use glam::{Affine3A, Quat, Vec3, Vec4};

/// Local transform of one animated joint or node.
///
/// `pos_scale.xyz` is the translation and `pos_scale.w` the uniform scale.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Pose {
    pub pos_scale: Vec4,
    pub rot: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Self = Self {
        pos_scale: Vec4::new(0.0, 0.0, 0.0, 1.0),
        rot: Quat::IDENTITY,
    };

    #[must_use]
    pub fn new(position: Vec3, scale: f32, rot: Quat) -> Self {
        Self {
            pos_scale: position.extend(scale),
            rot,
        }
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.pos_scale.truncate()
    }

    #[inline]
    #[must_use]
    pub fn scale(&self) -> f32 {
        self.pos_scale.w
    }

    /// Linear position/scale, spherical rotation. Endpoints are returned
    /// exactly.
    #[inline]
    #[must_use]
    pub fn interpolate(self, end: Self, t: f32) -> Self {
        if t <= 0.0 {
            return self;
        }
        if t >= 1.0 {
            return end;
        }
        Self {
            pos_scale: self.pos_scale.lerp(end.pos_scale, t),
            rot: self.rot.slerp(end.rot, t),
        }
    }

    /// Converts to an affine transform. Scale is only applied when the
    /// source reel animates it.
    #[must_use]
    pub fn to_affine(&self, has_scale: bool) -> Affine3A {
        let scale = if has_scale { self.scale() } else { 1.0 };
        Affine3A::from_scale_rotation_translation(Vec3::splat(scale), self.rot, self.position())
    }
}

/// `out[i] = a[i].interpolate(b[i], t)` over the shortest of the three slices.
pub fn blend_poses(out: &mut [Pose], a: &[Pose], b: &[Pose], t: f32) {
    for ((dst, &pa), &pb) in out.iter_mut().zip(a).zip(b) {
        *dst = pa.interpolate(pb, t);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn identity_is_default() {
        assert_eq!(Pose::default(), Pose::IDENTITY);
        let m = Pose::IDENTITY.to_affine(true);
        assert!(m.abs_diff_eq(Affine3A::IDENTITY, EPSILON));
    }

    #[test]
    fn interpolate_endpoints() {
        let a = Pose::new(Vec3::ZERO, 1.0, Quat::IDENTITY);
        let b = Pose::new(Vec3::new(2.0, 0.0, 0.0), 3.0, Quat::from_rotation_y(FRAC_PI_2));
        assert_eq!(a.interpolate(b, 0.0), a);
        assert_eq!(a.interpolate(b, 1.0), b);
        let mid = a.interpolate(b, 0.5);
        assert!((mid.position().x - 1.0).abs() < EPSILON);
        assert!((mid.scale() - 2.0).abs() < EPSILON);
        let expected = Quat::IDENTITY.slerp(Quat::from_rotation_y(FRAC_PI_2), 0.5);
        assert!(mid.rot.abs_diff_eq(expected, EPSILON));
    }

    #[test]
    fn scale_ignored_without_flag() {
        let p = Pose::new(Vec3::new(1.0, 2.0, 3.0), 4.0, Quat::IDENTITY);
        let with = p.to_affine(true);
        let without = p.to_affine(false);
        assert!((with.matrix3.x_axis.x - 4.0).abs() < EPSILON);
        assert!((without.matrix3.x_axis.x - 1.0).abs() < EPSILON);
        assert!((without.translation.z - 3.0).abs() < EPSILON);
    }

    #[test]
    fn blend_poses_slices() {
        let a = [Pose::IDENTITY; 3];
        let b = [Pose::new(Vec3::ONE, 1.0, Quat::IDENTITY); 3];
        let mut out = [Pose::IDENTITY; 3];
        blend_poses(&mut out, &a, &b, 0.25);
        for p in out {
            assert!((p.position().y - 0.25).abs() < EPSILON);
        }
    }
}
