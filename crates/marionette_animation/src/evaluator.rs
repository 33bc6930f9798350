//! Controller Evaluator
//!
//! Advances a [`ControllerInstance`] to a global time: checks transitions,
//! evaluates clips and blend trees, blends transitions, and writes each
//! layer's local poses.
//!
//! Time is absolute. Clip and transition progress is measured from the time
//! they were started, scaled by the instance playback rate (and the state's
//! speed for sequences).
//!
//! Intermediate pose buffers (blend-tree children, transition endpoints) come
//! from a caller-owned [`Bump`] arena. Nothing is freed individually; the
//! caller resets the arena between frames.

use bumpalo::Bump;

use crate::controller::{Condition, ConditionKind, ControllerDef, Sequence};
use crate::instance::{ControllerInstance, LayerInst, LayerMode, RuntimeState};
use crate::pose::{Pose, blend_poses};
use crate::reel::Reel;

impl ControllerInstance {
    /// Evaluates every layer at global time `time`.
    ///
    /// No-op while no reel is bound.
    pub fn update(&mut self, time: f32, scratch: &Bump) {
        let Some(bound) = &self.reel else {
            return;
        };
        let reel = bound.reel.clone();
        let def = self.def.clone();

        let mut eval = Evaluator {
            def: &def,
            reel: &reel,
            scratch,
            state: &mut self.state,
            time,
            playrate: self.playrate,
        };
        for (index, layer) in self.layers.iter_mut().enumerate() {
            eval.update_layer(index, layer);
        }
        self.time = time;
    }
}

struct Evaluator<'a> {
    def: &'a ControllerDef,
    reel: &'a Reel,
    scratch: &'a Bump,
    state: &'a mut RuntimeState,
    time: f32,
    playrate: f32,
}

impl Evaluator<'_> {
    fn update_layer(&mut self, index: usize, layer: &mut LayerInst) {
        if layer.poses.is_empty() {
            return;
        }

        loop {
            match layer.mode {
                LayerMode::InState(s) => {
                    if let Some(t) = self.check_state(s) {
                        log::trace!("Layer {index}: transition {t} from state {s}");
                        layer.mode = LayerMode::InTransition(t);
                        self.start_transition(t);
                        continue;
                    }
                    self.update_state(&mut layer.poses, s);
                }
                LayerMode::InTransition(t) => {
                    if let Some(target) = self.update_transition(&mut layer.poses, t) {
                        layer.mode = LayerMode::InState(target);
                    }
                }
                LayerMode::Idle => {
                    if let Some(s) = self.def.layers[index].default_state {
                        layer.mode = LayerMode::InState(s);
                        self.start_state(s);
                        self.update_state(&mut layer.poses, s);
                    }
                }
            }
            break;
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// First outgoing transition of `state` with a satisfied condition group.
    fn check_state(&self, state: u32) -> Option<u32> {
        let def = self.def;
        debug_assert!((state as usize) < def.states.len(), "state {state} out of range");
        def.state_transitions(&def.states[state as usize])
            .iter()
            .copied()
            .find(|&t| {
                let tr = &def.transitions[t as usize];
                tr.owner.is_some()
                    && tr.target.is_some()
                    && def.transition_groups(tr).any(|group| self.test_group(state, group))
            })
    }

    fn test_group(&self, state: u32, group: &[Condition]) -> bool {
        group.iter().all(|c| self.test_condition(state, c))
    }

    fn test_condition(&self, state: u32, cond: &Condition) -> bool {
        match cond.kind {
            ConditionKind::ExitTime => {
                let progress = self.state.state_progress(self.def, state);
                cond.predicate.test_float(progress, cond.value.as_float())
            }
            ConditionKind::Param(p) => {
                debug_assert!((p as usize) < self.state.params.len(), "param {p} out of range");
                self.state.params[p as usize].test(cond.predicate, cond.value)
            }
            ConditionKind::Unresolved => false,
        }
    }

    fn start_transition(&mut self, t: u32) {
        let inst = &mut self.state.transitions[t as usize];
        inst.start_time = self.time;
        inst.blend = 0.0;
        if let Some(target) = self.def.transitions[t as usize].target {
            self.start_state(target);
        }
    }

    /// Blends owner into target. Returns the target once the blend completes.
    fn update_transition(&mut self, out: &mut [Pose], t: u32) -> Option<u32> {
        let defs = self.def;
        let def = &defs.transitions[t as usize];
        let (Some(owner), Some(target)) = (def.owner, def.target) else {
            return None;
        };

        let inst = &mut self.state.transitions[t as usize];
        let elapsed = self.playrate * (self.time - inst.start_time);
        let blend = if def.duration > 0.0 {
            (elapsed / def.duration).clamp(0.0, 1.0)
        } else {
            1.0
        };
        inst.blend = blend;

        if blend >= 1.0 {
            self.update_state(out, target);
            return Some(target);
        }

        let scratch = self.scratch;
        let a = scratch.alloc_slice_fill_copy(out.len(), Pose::IDENTITY);
        let b = scratch.alloc_slice_fill_copy(out.len(), Pose::IDENTITY);
        self.update_state(a, owner);
        self.update_state(b, target);
        blend_poses(out, a, b, blend);
        None
    }

    // ========================================================================
    // States and sequences
    // ========================================================================

    fn start_state(&mut self, state: u32) {
        let seq = self.def.states[state as usize].sequence;
        self.start_sequence(seq);
    }

    fn start_sequence(&mut self, seq: Sequence) {
        match seq {
            Sequence::Clip(c) => {
                let inst = &mut self.state.clips[c as usize];
                inst.start_time = self.time;
                inst.local_time = 0.0;
                inst.progress = 0.0;
            }
            Sequence::BlendTree(b) => {
                let inst = &mut self.state.blend_trees[b as usize];
                inst.seq_a = None;
                inst.seq_b = None;
                inst.blend = 0.0;
                inst.progress = 0.0;

                let def = self.def;
                for &child in def.blend_tree_children(&def.blend_trees[b as usize]) {
                    self.start_sequence(child);
                }
            }
            Sequence::Empty => {}
        }
    }

    fn update_state(&mut self, out: &mut [Pose], state: u32) -> f32 {
        let defs = self.def;
        let s = &defs.states[state as usize];
        self.update_sequence(out, s.sequence, s.speed)
    }

    /// Writes the sequence's poses into `out`; returns its progress.
    fn update_sequence(&mut self, out: &mut [Pose], seq: Sequence, speed: f32) -> f32 {
        match seq {
            Sequence::Clip(c) => self.update_clip(out, c, speed),
            Sequence::BlendTree(b) => self.update_blend_tree(out, b, speed),
            Sequence::Empty => {
                out.fill(Pose::IDENTITY);
                0.0
            }
        }
    }

    fn update_clip(&mut self, out: &mut [Pose], clip: u32, speed: f32) -> f32 {
        let inst = &mut self.state.clips[clip as usize];
        let Some(reel_clip) = inst.reel_clip else {
            out.fill(Pose::IDENTITY);
            inst.progress = 1.0;
            return inst.progress;
        };

        let raw = self.playrate * speed * (self.time - inst.start_time);
        if inst.duration <= 0.0 {
            inst.local_time = 0.0;
            inst.progress = 1.0;
        } else if inst.looped {
            inst.local_time = raw.rem_euclid(inst.duration);
            inst.progress = raw / inst.duration;
        } else {
            inst.local_time = raw.clamp(0.0, inst.duration);
            inst.progress = (raw / inst.duration).clamp(0.0, 1.0);
        }

        self.reel.sample_clip(reel_clip as usize, inst.local_time, out);
        inst.progress
    }

    fn update_blend_tree(&mut self, out: &mut [Pose], tree: u32, speed: f32) -> f32 {
        let def = self.def;
        let bt = &def.blend_trees[tree as usize];
        let children = def.blend_tree_children(bt);
        if children.is_empty() {
            out.fill(Pose::IDENTITY);
            return 0.0;
        }

        let f = bt
            .param
            .map_or(0.0, |p| self.state.params[p as usize].as_float())
            .clamp(0.0, 1.0);
        let last = children.len() - 1;
        let position = f * last as f32;
        let idx = (position.floor() as usize).min(last);
        let next = (idx + 1).min(last);
        let blend = position - idx as f32;

        let inst = &mut self.state.blend_trees[tree as usize];
        inst.seq_a = Some(idx as u32);
        inst.seq_b = Some(next as u32);
        inst.blend = blend;

        let progress = if idx == next {
            self.update_sequence(out, children[idx], speed)
        } else {
            let scratch = self.scratch;
            let a = scratch.alloc_slice_fill_copy(out.len(), Pose::IDENTITY);
            let b = scratch.alloc_slice_fill_copy(out.len(), Pose::IDENTITY);
            let pa = self.update_sequence(a, children[idx], speed);
            let pb = self.update_sequence(b, children[next], speed);
            blend_poses(out, a, b, blend);
            (1.0 - blend) * pa + blend * pb
        };

        self.state.blend_trees[tree as usize].progress = progress;
        progress
    }
}
