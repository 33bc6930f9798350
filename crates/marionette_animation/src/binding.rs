//! Binding / Fetch
//!
//! Maps reel pose indices onto a target skeleton or node hierarchy and
//! writes composited layer transforms into caller storage.
//!
//! A [`BindMap`] is built once per (reel, target) pair by matching every
//! reel bind name against the target's joint or node names. A reel that
//! animates a joint the target does not have is a hard error.
//!
//! Compositing walks layers in definition order per pose index:
//! - override layers replace the accumulator where their mask is non-zero
//! - additive layers add `transform * mask`
//!
//! The root matrix is applied after compositing, only to root targets that
//! were written this frame, so it never accumulates across updates.

use glam::Affine3A;
use smallvec::SmallVec;

use marionette_core::{MarionetteError, Result};

use crate::controller::LayerBlend;
use crate::instance::{ControllerInstance, LayerMode};
use crate::pose::Pose;
use crate::reel::Reel;

/// Joint or node names with their parent links, as provided by the model side.
#[derive(Debug, Clone, Default)]
pub struct JointHierarchy {
    names: Vec<String>,
    parents: Vec<Option<usize>>,
    root_matrix: Affine3A,
}

impl JointHierarchy {
    #[must_use]
    pub fn new(root_matrix: Affine3A) -> Self {
        Self {
            names: Vec::new(),
            parents: Vec::new(),
            root_matrix,
        }
    }

    /// Appends a joint and returns its index.
    pub fn push(&mut self, name: impl Into<String>, parent: Option<usize>) -> usize {
        self.names.push(name.into());
        self.parents.push(parent);
        self.names.len() - 1
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[must_use]
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn parent(&self, index: usize) -> Option<usize> {
        self.parents.get(index).copied().flatten()
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    #[inline]
    #[must_use]
    pub fn root_matrix(&self) -> Affine3A {
        self.root_matrix
    }

    pub fn set_root_matrix(&mut self, m: Affine3A) {
        self.root_matrix = m;
    }
}

/// Destination storage for composited transforms.
pub trait TransformSink {
    fn transform_mut(&mut self, target: usize) -> Option<&mut Affine3A>;
}

impl TransformSink for [Affine3A] {
    fn transform_mut(&mut self, target: usize) -> Option<&mut Affine3A> {
        self.get_mut(target)
    }
}

impl TransformSink for Vec<Affine3A> {
    fn transform_mut(&mut self, target: usize) -> Option<&mut Affine3A> {
        self.get_mut(target)
    }
}

/// Pose index to target index map.
#[derive(Debug, Clone, PartialEq)]
pub struct BindMap {
    targets: Vec<usize>,
    /// Pose indices whose target receives the root matrix.
    roots: SmallVec<[usize; 4]>,
    root_matrix: Affine3A,
}

impl BindMap {
    /// Binds against a skeleton. Roots are joints without a parent.
    pub fn for_skeleton(reel: &Reel, skeleton: &JointHierarchy) -> Result<Self> {
        Self::build(reel, skeleton, |joint| skeleton.parent(joint).is_none())
    }

    /// Binds against a scene node hierarchy. Roots are nodes directly under
    /// a top-level node.
    pub fn for_hierarchy(reel: &Reel, hierarchy: &JointHierarchy) -> Result<Self> {
        Self::build(reel, hierarchy, |node| {
            hierarchy
                .parent(node)
                .is_some_and(|p| hierarchy.parent(p).is_none())
        })
    }

    fn build(
        reel: &Reel,
        target: &JointHierarchy,
        is_root: impl Fn(usize) -> bool,
    ) -> Result<Self> {
        let mut targets = Vec::with_capacity(reel.pose_count());
        let mut roots = SmallVec::new();

        for (pose, name) in reel.pose_bindings().iter().enumerate() {
            let Some(index) = target.find(name) else {
                return Err(MarionetteError::Bind(format!(
                    "bind name '{name}' of reel '{}' has no matching joint",
                    reel.name()
                )));
            };
            if is_root(index) {
                roots.push(pose);
            }
            targets.push(index);
        }

        log::debug!(
            "Bound reel '{}': {} poses, {} roots",
            reel.name(),
            targets.len(),
            roots.len()
        );
        Ok(Self {
            targets,
            roots,
            root_matrix: target.root_matrix(),
        })
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    #[must_use]
    pub fn target(&self, pose: usize) -> Option<usize> {
        self.targets.get(pose).copied()
    }

    #[must_use]
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    #[must_use]
    pub fn is_root(&self, pose: usize) -> bool {
        self.roots.contains(&pose)
    }

    #[inline]
    #[must_use]
    pub fn root_matrix(&self) -> Affine3A {
        self.root_matrix
    }

    pub fn set_root_matrix(&mut self, m: Affine3A) {
        self.root_matrix = m;
    }

    fn write<S: TransformSink + ?Sized>(&self, pose: usize, mut m: Affine3A, sink: &mut S) {
        let Some(target) = self.target(pose) else {
            return;
        };
        if self.is_root(pose) {
            m = self.root_matrix * m;
        }
        if let Some(slot) = sink.transform_mut(target) {
            *slot = m;
        }
    }

    /// Writes a raw pose buffer, e.g. a sampled clip or frame.
    pub fn write_poses<S: TransformSink + ?Sized>(
        &self,
        reel: &Reel,
        poses: &[Pose],
        sink: &mut S,
    ) {
        let has_scale = reel.has_scale();
        for (i, pose) in poses.iter().enumerate() {
            self.write(i, pose.to_affine(has_scale), sink);
        }
    }
}

impl ControllerInstance {
    /// Composited local transform of one pose index, or `None` if no active
    /// layer contributes to it.
    fn composite_pose(&self, pose: usize, has_scale: bool) -> Option<Affine3A> {
        let mut acc = Affine3A::ZERO;
        let mut written = false;

        for (layer, inst) in self.def.layers.iter().zip(&self.layers) {
            if inst.mode == LayerMode::Idle {
                continue;
            }
            let (Some(p), Some(&weight)) = (inst.poses.get(pose), inst.mask.get(pose)) else {
                continue;
            };
            if weight == 0.0 {
                continue;
            }

            let src = p.to_affine(has_scale);
            match layer.blend {
                LayerBlend::Override => acc = src,
                LayerBlend::Additive => {
                    acc.matrix3 += src.matrix3 * weight;
                    acc.translation += src.translation * weight;
                }
            }
            written = true;
        }
        written.then_some(acc)
    }

    /// Composites all layers into `out`, one transform per pose index.
    /// Entries no layer contributes to are left untouched.
    pub fn composite(&self, out: &mut [Affine3A]) {
        let Some(reel) = self.reel() else {
            return;
        };
        let has_scale = reel.has_scale();
        for (i, slot) in out.iter_mut().enumerate().take(reel.pose_count()) {
            if let Some(m) = self.composite_pose(i, has_scale) {
                *slot = m;
            }
        }
    }

    /// Composites all layers and writes them through `bindmap`, applying the
    /// root matrix to root targets.
    pub fn fetch_result<S: TransformSink + ?Sized>(&self, bindmap: &BindMap, sink: &mut S) {
        let Some(reel) = self.reel() else {
            return;
        };
        let has_scale = reel.has_scale();
        for i in 0..reel.pose_count().min(bindmap.len()) {
            if let Some(m) = self.composite_pose(i, has_scale) {
                bindmap.write(i, m, sink);
            }
        }
    }
}
