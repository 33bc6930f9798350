//! Controller Definition
//!
//! The compiled, immutable description of a character's animation state
//! machine: parameters, clips, blend trees, states, layers and transitions.
//! One definition is shared (`Arc<ControllerDef>`) by every instance created
//! from it.
//!
//! # Storage
//!
//! Nested lists (transition groups, group conditions, blend-tree children,
//! state transitions, layer states, bone masks) are flattened into shared
//! pools and addressed by [`Span`]s. Every pool is sized exactly by the
//! counting pass of the loader (see [`DefinitionCounts`]).
//!
//! # Invariants after load
//!
//! Every stored index is valid. References that were out of range in the
//! source document are stored as `None` / [`Sequence::Empty`] or dropped
//! from index lists, and a warning is logged.

mod document;
mod loader;

pub use loader::DefinitionCounts;

use marionette_core::NameHash;
use rustc_hash::FxHashMap;

use crate::params::{ParamType, ParamValue, Predicate};

/// A `[start, start + len)` range into one of the definition's pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: u32,
    pub len: u32,
}

impl Span {
    #[inline]
    #[must_use]
    pub fn range(self) -> std::ops::Range<usize> {
        self.start as usize..(self.start + self.len) as usize
    }

    #[inline]
    #[must_use]
    pub fn of<T>(self, pool: &[T]) -> &[T] {
        &pool[self.range()]
    }

    #[inline]
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.len == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDef {
    pub name: String,
    pub default: ParamValue,
}

impl ParamDef {
    #[inline]
    #[must_use]
    pub fn param_type(&self) -> ParamType {
        self.default.param_type()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClipDef {
    pub name: String,
    pub hash: NameHash,
}

/// What a state or blend-tree child plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sequence {
    Clip(u32),
    BlendTree(u32),
    /// Unresolved or unknown; evaluates to nothing with progress 0.
    #[default]
    Empty,
}

impl Sequence {
    /// Case-insensitive `"clip"` / `"blendtree"`; anything else is `Empty`.
    #[must_use]
    pub fn parse(kind: &str, index: u32) -> Self {
        if kind.eq_ignore_ascii_case("clip") {
            Self::Clip(index)
        } else if kind.eq_ignore_ascii_case("blendtree") {
            Self::BlendTree(index)
        } else {
            Self::Empty
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKind {
    /// Compares the owner state's normalized progress.
    ExitTime,
    /// Compares a live parameter value.
    Param(u32),
    /// References a parameter that does not exist; never satisfied.
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Condition {
    pub kind: ConditionKind,
    pub predicate: Predicate,
    pub value: ParamValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionDef {
    pub duration: f32,
    pub owner: Option<u32>,
    pub target: Option<u32>,
    /// Into [`ControllerDef::groups`]; each group is a span into
    /// [`ControllerDef::conditions`].
    pub groups: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlendTreeDef {
    pub name: String,
    /// Driving float parameter.
    pub param: Option<u32>,
    /// Into [`ControllerDef::sequences`].
    pub children: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateDef {
    pub name: String,
    pub speed: f32,
    pub sequence: Sequence,
    /// Outgoing transitions, into [`ControllerDef::indices`].
    pub transitions: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerBlend {
    #[default]
    Override,
    Additive,
}

impl LayerBlend {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("additive") {
            Self::Additive
        } else {
            Self::Override
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Override => "override",
            Self::Additive => "additive",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerDef {
    pub name: String,
    pub blend: LayerBlend,
    pub default_state: Option<u32>,
    /// Member states, into [`ControllerDef::indices`].
    pub states: Span,
    /// Into [`ControllerDef::bone_masks`].
    pub bone_mask: Span,
}

#[derive(Debug, Clone, Default)]
pub struct ControllerDef {
    pub(crate) reel_path: String,
    pub(crate) params: Vec<ParamDef>,
    pub(crate) param_lookup: FxHashMap<NameHash, u32>,
    pub(crate) clips: Vec<ClipDef>,
    pub(crate) transitions: Vec<TransitionDef>,
    pub(crate) groups: Vec<Span>,
    pub(crate) conditions: Vec<Condition>,
    pub(crate) blend_trees: Vec<BlendTreeDef>,
    pub(crate) sequences: Vec<Sequence>,
    pub(crate) states: Vec<StateDef>,
    pub(crate) layers: Vec<LayerDef>,
    pub(crate) indices: Vec<u32>,
    pub(crate) bone_masks: Vec<String>,
}

impl ControllerDef {
    #[inline]
    #[must_use]
    pub fn reel_path(&self) -> &str {
        &self.reel_path
    }

    #[inline]
    #[must_use]
    pub fn params(&self) -> &[ParamDef] {
        &self.params
    }

    #[inline]
    #[must_use]
    pub fn clips(&self) -> &[ClipDef] {
        &self.clips
    }

    #[inline]
    #[must_use]
    pub fn transitions(&self) -> &[TransitionDef] {
        &self.transitions
    }

    #[inline]
    #[must_use]
    pub fn blend_trees(&self) -> &[BlendTreeDef] {
        &self.blend_trees
    }

    #[inline]
    #[must_use]
    pub fn states(&self) -> &[StateDef] {
        &self.states
    }

    #[inline]
    #[must_use]
    pub fn layers(&self) -> &[LayerDef] {
        &self.layers
    }

    /// Condition groups of a transition; each is a list of conditions.
    pub fn transition_groups(&self, t: &TransitionDef) -> impl Iterator<Item = &[Condition]> {
        t.groups.of(&self.groups).iter().map(|g| g.of(&self.conditions))
    }

    #[inline]
    #[must_use]
    pub fn blend_tree_children(&self, bt: &BlendTreeDef) -> &[Sequence] {
        bt.children.of(&self.sequences)
    }

    #[inline]
    #[must_use]
    pub fn state_transitions(&self, s: &StateDef) -> &[u32] {
        s.transitions.of(&self.indices)
    }

    #[inline]
    #[must_use]
    pub fn layer_states(&self, l: &LayerDef) -> &[u32] {
        l.states.of(&self.indices)
    }

    #[inline]
    #[must_use]
    pub fn layer_bone_mask(&self, l: &LayerDef) -> &[String] {
        l.bone_mask.of(&self.bone_masks)
    }

    #[must_use]
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.param_lookup.get(&NameHash::of(name)).map(|&i| i as usize)
    }

    #[must_use]
    pub fn state_index(&self, name: &str) -> Option<usize> {
        self.states.iter().position(|s| s.name == name)
    }

    #[must_use]
    pub fn layer_index(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.name == name)
    }

    /// Array sizes after validation. Index lists may be shorter than the
    /// counting pass reported when invalid entries were dropped.
    #[must_use]
    pub fn counts(&self) -> DefinitionCounts {
        DefinitionCounts {
            params: self.params.len(),
            clips: self.clips.len(),
            transitions: self.transitions.len(),
            groups: self.groups.len(),
            conditions: self.conditions.len(),
            blend_trees: self.blend_trees.len(),
            children: self.sequences.len(),
            states: self.states.len(),
            state_transitions: self.states.iter().map(|s| s.transitions.len as usize).sum(),
            layers: self.layers.len(),
            layer_states: self.layers.iter().map(|l| l.states.len as usize).sum(),
            bone_masks: self.bone_masks.len(),
        }
    }
}
