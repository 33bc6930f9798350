//! Controller Instance
//!
//! Per-character mutable evaluation state: global time, playback rate,
//! parameter values, per-layer active state or transition with its pose
//! buffer and bone mask, and per-clip / per-blend-tree / per-transition
//! progress. All arrays mirror the definition's arrays index for index.
//!
//! An instance is created against a shared [`ControllerDef`] and resolves
//! the reel the definition names through a [`ReelLibrary`]. Evaluation lives
//! in [`crate::evaluator`]; compositing and output in [`crate::binding`].

use std::fmt::Write as _;
use std::sync::Arc;

use marionette_core::memory::try_vec_filled;
use marionette_core::{MarionetteError, Result};

use crate::controller::{ControllerDef, Sequence};
use crate::library::{ReelHandle, ReelLibrary};
use crate::params::{ParamType, ParamValue};
use crate::pose::Pose;
use crate::reel::Reel;
use crate::settings::AnimationSettings;

/// What a layer is doing. A layer never holds a state and a transition at
/// the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerMode {
    /// Not started yet; the next update enters the default state.
    #[default]
    Idle,
    InState(u32),
    InTransition(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct ClipInst {
    pub start_time: f32,
    pub local_time: f32,
    pub progress: f32,
    pub duration: f32,
    pub looped: bool,
    /// Index into the bound reel's clip table.
    pub reel_clip: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct BlendTreeInst {
    pub seq_a: Option<u32>,
    pub seq_b: Option<u32>,
    pub blend: f32,
    pub progress: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct TransitionInst {
    pub start_time: f32,
    pub blend: f32,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct LayerInst {
    pub mode: LayerMode,
    pub poses: Vec<Pose>,
    pub mask: Vec<f32>,
}

/// Runtime arrays touched by the evaluator.
#[derive(Debug, Clone, Default)]
pub(crate) struct RuntimeState {
    pub params: Vec<ParamValue>,
    pub clips: Vec<ClipInst>,
    pub blend_trees: Vec<BlendTreeInst>,
    pub transitions: Vec<TransitionInst>,
}

impl RuntimeState {
    /// Normalized progress of a state's sequence, clamped to `[0, 1]`.
    pub fn state_progress(&self, def: &ControllerDef, state: u32) -> f32 {
        debug_assert!((state as usize) < def.states.len(), "state {state} out of range");
        let progress = match def.states[state as usize].sequence {
            Sequence::Clip(c) => self.clips[c as usize].progress,
            Sequence::BlendTree(b) => self.blend_trees[b as usize].progress,
            Sequence::Empty => 0.0,
        };
        progress.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct BoundReel {
    pub handle: ReelHandle,
    pub reel: Arc<Reel>,
}

/// Active state of a layer, for debug display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateSnapshot<'a> {
    pub name: &'a str,
    pub progress: f32,
}

/// Active transition of a layer, for debug display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionSnapshot<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub blend: f32,
}

#[derive(Debug)]
pub struct ControllerInstance {
    pub(crate) def: Arc<ControllerDef>,
    pub(crate) reel: Option<BoundReel>,
    pub(crate) time: f32,
    pub(crate) playrate: f32,
    pub(crate) state: RuntimeState,
    pub(crate) layers: Vec<LayerInst>,
}

impl ControllerInstance {
    /// Creates an instance and binds it to the reel the definition names,
    /// loading it through `reels` if needed.
    pub fn new(
        def: Arc<ControllerDef>,
        reels: &ReelLibrary,
        settings: &AnimationSettings,
    ) -> Result<Self> {
        let params = {
            let mut v =
                try_vec_filled(def.params.len(), ParamValue::default(), "controller params")?;
            for (value, p) in v.iter_mut().zip(&def.params) {
                *value = p.default;
            }
            v
        };
        let state = RuntimeState {
            params,
            clips: try_vec_filled(def.clips.len(), ClipInst::default(), "controller clips")?,
            blend_trees: try_vec_filled(
                def.blend_trees.len(),
                BlendTreeInst::default(),
                "controller blend trees",
            )?,
            transitions: try_vec_filled(
                def.transitions.len(),
                TransitionInst::default(),
                "controller transitions",
            )?,
        };
        let layers = try_vec_filled(def.layers.len(), LayerInst::default(), "controller layers")?;

        let handle = reels.load(def.reel_path()).map_err(|e| {
            MarionetteError::Bind(format!("reel '{}' cannot be resolved: {e}", def.reel_path()))
        })?;

        let mut inst = Self {
            def,
            reel: None,
            time: 0.0,
            playrate: settings.default_playrate,
            state,
            layers,
        };
        inst.set_reel(reels, handle)?;
        Ok(inst)
    }

    #[inline]
    #[must_use]
    pub fn definition(&self) -> &Arc<ControllerDef> {
        &self.def
    }

    /// Global time of the last update.
    #[inline]
    #[must_use]
    pub fn time(&self) -> f32 {
        self.time
    }

    #[inline]
    #[must_use]
    pub fn playrate(&self) -> f32 {
        self.playrate
    }

    pub fn set_playrate(&mut self, rate: f32) {
        self.playrate = rate;
    }

    // ========================================================================
    // Reel binding
    // ========================================================================

    #[must_use]
    pub fn reel_handle(&self) -> Option<ReelHandle> {
        self.reel.as_ref().map(|b| b.handle)
    }

    #[must_use]
    pub fn reel(&self) -> Option<&Arc<Reel>> {
        self.reel.as_ref().map(|b| &b.reel)
    }

    /// Rebinds to the reel stored under `handle` (hot reload path).
    pub fn set_reel(&mut self, reels: &ReelLibrary, handle: ReelHandle) -> Result<()> {
        let reel = reels
            .get(handle)
            .ok_or_else(|| MarionetteError::Bind(format!("reel handle {handle:?} is not loaded")))?;
        self.unbind();
        self.bind(handle, reel)
    }

    fn bind(&mut self, handle: ReelHandle, reel: Arc<Reel>) -> Result<()> {
        let def = &self.def;

        for (inst, clip) in self.state.clips.iter_mut().zip(&def.clips) {
            match reel.find_clip_hashed(clip.hash).and_then(|i| reel.clip(i).map(|c| (i, c))) {
                Some((i, rc)) => {
                    inst.reel_clip = Some(i as u32);
                    inst.duration = rc.duration;
                    inst.looped = rc.looped;
                }
                None => {
                    log::warn!("Clip '{}' not found in reel '{}'", clip.name, reel.name());
                    inst.reel_clip = None;
                    inst.duration = 0.0;
                    inst.looped = false;
                }
            }
        }

        let pose_count = reel.pose_count();
        for (i, (inst, layer)) in self.layers.iter_mut().zip(&def.layers).enumerate() {
            inst.poses = try_vec_filled(pose_count, Pose::IDENTITY, "layer poses")?;
            let bone_mask = def.layer_bone_mask(layer);

            // The first layer covers the full body unless it names a mask.
            let full_body = i == 0 && bone_mask.is_empty();
            let fill = if full_body { 1.0 } else { 0.0 };
            inst.mask = try_vec_filled(pose_count, fill, "layer mask")?;
            for bone in bone_mask {
                match reel.find_pose_binding(bone) {
                    Some(p) => inst.mask[p] = 1.0,
                    None => log::debug!(
                        "Layer '{}': bone '{bone}' is not animated by '{}'",
                        layer.name,
                        reel.name()
                    ),
                }
            }
        }

        self.reel = Some(BoundReel { handle, reel });
        Ok(())
    }

    /// Releases layer buffers and the reel. Updates become no-ops.
    pub fn unbind(&mut self) {
        for layer in &mut self.layers {
            layer.poses = Vec::new();
            layer.mask = Vec::new();
        }
        self.reel = None;
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    #[must_use]
    pub fn param(&self, name: &str) -> Option<ParamValue> {
        self.lookup_param(name).map(|i| self.state.params[i])
    }

    #[must_use]
    pub fn param_type(&self, name: &str) -> Option<ParamType> {
        self.lookup_param(name).map(|i| self.def.params[i].param_type())
    }

    fn lookup_param(&self, name: &str) -> Option<usize> {
        let index = self.def.param_index(name);
        if index.is_none() {
            log::warn!("Unknown controller parameter '{name}'");
        }
        index
    }

    /// Sets a parameter by name. Unknown names are ignored (returns
    /// `false`); values of the wrong type are converted to the declared type.
    pub fn set_param(&mut self, name: &str, value: ParamValue) -> bool {
        let Some(i) = self.lookup_param(name) else {
            return false;
        };
        let ty = self.def.params[i].param_type();
        if value.param_type() != ty {
            log::warn!(
                "Parameter '{name}' is {}, got {}",
                ty.as_str(),
                value.param_type().as_str()
            );
        }
        self.state.params[i] = value.coerce(ty);
        true
    }

    pub fn set_float(&mut self, name: &str, value: f32) -> bool {
        self.set_param(name, ParamValue::Float(value))
    }

    pub fn set_int(&mut self, name: &str, value: i32) -> bool {
        self.set_param(name, ParamValue::Int(value))
    }

    pub fn set_bool(&mut self, name: &str, value: bool) -> bool {
        self.set_param(name, ParamValue::Bool(value))
    }

    #[must_use]
    pub fn float_param(&self, name: &str) -> Option<f32> {
        self.param(name).map(ParamValue::as_float)
    }

    #[must_use]
    pub fn int_param(&self, name: &str) -> Option<i32> {
        self.param(name).map(ParamValue::as_int)
    }

    #[must_use]
    pub fn bool_param(&self, name: &str) -> Option<bool> {
        self.param(name).map(ParamValue::as_bool)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    #[must_use]
    pub fn layer_mode(&self, layer: usize) -> Option<LayerMode> {
        self.layers.get(layer).map(|l| l.mode)
    }

    /// Locally blended poses of a layer from the last update.
    #[must_use]
    pub fn layer_poses(&self, layer: usize) -> Option<&[Pose]> {
        self.layers.get(layer).map(|l| l.poses.as_slice())
    }

    #[must_use]
    pub fn layer_mask(&self, layer: usize) -> Option<&[f32]> {
        self.layers.get(layer).map(|l| l.mask.as_slice())
    }

    /// Active state of the named layer and its progress in `[0, 1]`.
    #[must_use]
    pub fn current_state(&self, layer: &str) -> Option<StateSnapshot<'_>> {
        let li = self.def.layer_index(layer)?;
        match self.layers[li].mode {
            LayerMode::InState(s) => Some(StateSnapshot {
                name: &self.def.states[s as usize].name,
                progress: self.state.state_progress(&self.def, s),
            }),
            _ => None,
        }
    }

    /// Active transition of the named layer.
    #[must_use]
    pub fn current_transition(&self, layer: &str) -> Option<TransitionSnapshot<'_>> {
        let li = self.def.layer_index(layer)?;
        match self.layers[li].mode {
            LayerMode::InTransition(t) => {
                let def = &self.def.transitions[t as usize];
                let name =
                    |s: Option<u32>| s.map_or("", |s| self.def.states[s as usize].name.as_str());
                Some(TransitionSnapshot {
                    from: name(def.owner),
                    to: name(def.target),
                    blend: self.state.transitions[t as usize].blend,
                })
            }
            _ => None,
        }
    }

    /// Multi-line description of time, parameters and layer states.
    #[must_use]
    pub fn debug_report(&self) -> String {
        let def = &self.def;
        let mut out = String::new();
        let _ = writeln!(out, "time: {:.3}", self.time);
        let _ = writeln!(out, "params:");
        for (p, value) in def.params.iter().zip(&self.state.params) {
            let _ = writeln!(out, "  {}: {value}", p.name);
        }

        for (layer, inst) in def.layers.iter().zip(&self.layers) {
            let _ = writeln!(out, "layer: {}", layer.name);
            match inst.mode {
                LayerMode::Idle => {
                    let _ = writeln!(out, "  idle");
                }
                LayerMode::InState(s) => {
                    let state = &def.states[s as usize];
                    let _ = writeln!(out, "  state: {}", state.name);
                    match state.sequence {
                        Sequence::Clip(c) => {
                            let _ = writeln!(
                                out,
                                "    clip: {}, {:.3}",
                                def.clips[c as usize].name,
                                self.state.clips[c as usize].progress
                            );
                        }
                        Sequence::BlendTree(b) => {
                            let bt = &self.state.blend_trees[b as usize];
                            let _ = writeln!(
                                out,
                                "    blendtree: {} ({:?}, {:?}, blend={:.2}, progress={:.2})",
                                def.blend_trees[b as usize].name,
                                bt.seq_a,
                                bt.seq_b,
                                bt.blend,
                                bt.progress
                            );
                        }
                        Sequence::Empty => {}
                    }
                }
                LayerMode::InTransition(t) => {
                    let _ = writeln!(out, "  transition: {t}");
                    let duration = def.transitions[t as usize].duration;
                    let blend = self.state.transitions[t as usize].blend;
                    let _ = writeln!(out, "    duration: {duration:.2}");
                    let _ = writeln!(out, "    blend: {blend:.2}");
                }
            }
        }
        out
    }

    /// Logs [`Self::debug_report`] at debug level.
    pub fn debug(&self) {
        log::debug!("{}", self.debug_report());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reel::ReelBuilder;
    use marionette_core::{JsonDocument, MemoryFileSource};
    use serde_json::json;

    fn setup() -> (ReelLibrary, Arc<ControllerDef>) {
        let _ = env_logger::builder().is_test(true).try_init();
        let fs = Arc::new(MemoryFileSource::new());
        let mut b = ReelBuilder::new("hero", 10);
        b.bind("hips").bind("spine").bind("head");
        b.frame(vec![Pose::IDENTITY; 3]).frame(vec![Pose::IDENTITY; 3]);
        b.clip("idle", 0, 2, true);
        fs.insert("hero.h3da", b.encode());

        let doc = JsonDocument::from_value(json!({
            "reel": "hero.h3da",
            "params": [{"name": "speed", "type": "float", "value": 0.25}, {"name": "armed", "type": "bool"}],
            "clips": [{"name": "idle"}, {"name": "missing"}],
            "states": [{"name": "Idle", "sequence": {"type": "clip", "id": 0}}],
            "layers": [
                {"name": "base", "default": 0, "states": [0]},
                {"name": "upper", "default": 0, "layer": "additive", "states": [0], "bone-mask": ["spine", "tail"]}
            ]
        }));
        let settings = AnimationSettings::default();
        let def = ControllerDef::from_document(doc.root(), &settings).unwrap();
        (ReelLibrary::new(fs, settings), Arc::new(def))
    }

    #[test]
    fn create_binds_reel_and_defaults() {
        let (lib, def) = setup();
        let inst = ControllerInstance::new(def, &lib, &AnimationSettings::default()).unwrap();
        assert!(inst.reel().is_some());
        assert_eq!(inst.param("speed"), Some(ParamValue::Float(0.25)));
        assert_eq!(inst.bool_param("armed"), Some(false));
        assert_eq!(inst.layer_mode(0), Some(LayerMode::Idle));

        assert_eq!(inst.state.clips[0].reel_clip, Some(0));
        assert!((inst.state.clips[0].duration - 0.2).abs() < 1e-5);
        assert_eq!(inst.state.clips[1].reel_clip, None);
    }

    #[test]
    fn bone_masks() {
        let (lib, def) = setup();
        let inst = ControllerInstance::new(def, &lib, &AnimationSettings::default()).unwrap();
        assert_eq!(inst.layer_mask(0).unwrap(), &[1.0, 1.0, 1.0]);
        assert_eq!(inst.layer_mask(1).unwrap(), &[0.0, 1.0, 0.0]);
        assert_eq!(inst.layer_poses(1).unwrap().len(), 3);
    }

    #[test]
    fn set_param_coerces_and_rejects_unknown() {
        let (lib, def) = setup();
        let mut inst = ControllerInstance::new(def, &lib, &AnimationSettings::default()).unwrap();
        assert!(inst.set_int("speed", 2));
        assert_eq!(inst.param("speed"), Some(ParamValue::Float(2.0)));
        assert!(!inst.set_float("nope", 1.0));
        assert_eq!(inst.param_type("armed"), Some(ParamType::Bool));
        assert_eq!(inst.param_type("nope"), None);
    }

    #[test]
    fn unknown_param_reads_are_none() {
        let (lib, def) = setup();
        let inst = ControllerInstance::new(def, &lib, &AnimationSettings::default()).unwrap();
        assert_eq!(inst.param("nope"), None);
        assert_eq!(inst.float_param("nope"), None);
        assert_eq!(inst.bool_param("armed"), Some(false));
    }

    #[test]
    fn unresolvable_reel_is_bind_error() {
        let fs = Arc::new(MemoryFileSource::new());
        let lib = ReelLibrary::new(fs, AnimationSettings::default());
        let doc = JsonDocument::from_value(json!({"reel": "absent.h3da"}));
        let def = ControllerDef::from_document(doc.root(), &AnimationSettings::default()).unwrap();
        let settings = AnimationSettings::default();
        let err = ControllerInstance::new(Arc::new(def), &lib, &settings).unwrap_err();
        assert!(matches!(err, MarionetteError::Bind(_)));
    }

    #[test]
    fn unbind_releases_buffers() {
        let (lib, def) = setup();
        let mut inst = ControllerInstance::new(def, &lib, &AnimationSettings::default()).unwrap();
        let handle = inst.reel_handle().unwrap();
        inst.unbind();
        assert!(inst.reel().is_none());
        assert!(inst.layer_poses(0).unwrap().is_empty());
        inst.set_reel(&lib, handle).unwrap();
        assert_eq!(inst.layer_poses(0).unwrap().len(), 3);
    }

    #[test]
    fn debug_report_lists_layers() {
        let (lib, def) = setup();
        let inst = ControllerInstance::new(def, &lib, &AnimationSettings::default()).unwrap();
        let report = inst.debug_report();
        assert!(report.contains("layer: base"));
        assert!(report.contains("speed"));
        assert!(inst.current_state("base").is_none());
        assert!(inst.current_transition("base").is_none());
    }
}
