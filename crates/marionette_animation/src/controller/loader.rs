//! Two-pass controller document loader.
//!
//! Pass 1 walks the document only to count every nested array and derive the
//! exact storage size. Pass 2 walks it again and fills pools that were
//! reserved once with those counts.

use std::collections::hash_map::Entry;
use std::io;

use marionette_core::document::DocumentNode;
use marionette_core::memory::{check_budget, try_vec_with_capacity};
use marionette_core::{FileSource, JsonDocument, MarionetteError, NameHash, Result};
use rustc_hash::FxHashMap;

use super::{
    BlendTreeDef, ClipDef, Condition, ConditionKind, ControllerDef, LayerBlend, LayerDef, ParamDef,
    Sequence, Span, StateDef, TransitionDef,
};
use crate::params::{ParamType, ParamValue, Predicate};
use crate::settings::AnimationSettings;

/// Array sizes found by the counting pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DefinitionCounts {
    pub params: usize,
    pub clips: usize,
    pub transitions: usize,
    pub groups: usize,
    pub conditions: usize,
    pub blend_trees: usize,
    /// Blend-tree children over all trees.
    pub children: usize,
    pub states: usize,
    /// Outgoing transition indices over all states.
    pub state_transitions: usize,
    pub layers: usize,
    /// Member state indices over all layers.
    pub layer_states: usize,
    /// Bone-mask names over all layers.
    pub bone_masks: usize,
}

impl DefinitionCounts {
    pub fn count<N: DocumentNode>(root: &N) -> Self {
        Self {
            params: root.child_count("params"),
            clips: root.child_count("clips"),
            transitions: root.child_count("transitions"),
            groups: nested_count(root, "transitions", "groups"),
            conditions: root
                .child("transitions")
                .map_or(0, |t| items(t).map(|tr| nested_count(&tr, "groups", "conditions")).sum()),
            blend_trees: root.child_count("blendtrees"),
            children: nested_count(root, "blendtrees", "childs"),
            states: root.child_count("states"),
            state_transitions: nested_count(root, "states", "transitions"),
            layers: root.child_count("layers"),
            layer_states: nested_count(root, "layers", "states"),
            bone_masks: nested_count(root, "layers", "bone-mask"),
        }
    }

    /// Bytes needed to store a definition with these counts.
    #[must_use]
    pub fn arena_bytes(&self) -> usize {
        [
            self.params * (size_of::<ParamDef>() + size_of::<(NameHash, u32)>()),
            self.clips * size_of::<ClipDef>(),
            self.transitions * size_of::<TransitionDef>(),
            self.groups * size_of::<Span>(),
            self.conditions * size_of::<Condition>(),
            self.blend_trees * size_of::<BlendTreeDef>(),
            self.children * size_of::<Sequence>(),
            self.states * size_of::<StateDef>(),
            (self.state_transitions + self.layer_states) * size_of::<u32>(),
            self.layers * size_of::<LayerDef>(),
            self.bone_masks * size_of::<String>(),
        ]
        .iter()
        .fold(size_of::<ControllerDef>(), |acc, &n| acc.saturating_add(n))
    }
}

fn items<N: DocumentNode>(array: N) -> impl Iterator<Item = N> {
    (0..array.array_item_count()).filter_map(move |i| array.array_item(i))
}

fn items_of<N: DocumentNode>(array: Option<N>) -> impl Iterator<Item = N> {
    array.into_iter().flat_map(items)
}

/// Sum of `parent[outer][*][inner].len()`.
fn nested_count<N: DocumentNode>(parent: &N, outer: &str, inner: &str) -> usize {
    items_of(parent.child(outer)).map(|item| item.child_count(inner)).sum()
}

fn read_value<N: DocumentNode>(node: &N, ty: ParamType) -> ParamValue {
    match ty {
        ParamType::Int => ParamValue::Int(node.child_int("value", 0) as i32),
        ParamType::Float => ParamValue::Float(node.child_float("value", 0.0)),
        ParamType::Bool => ParamValue::Bool(node.child_bool("value", false)),
    }
}

fn span(start: usize, end: usize) -> Span {
    Span {
        start: start as u32,
        len: (end - start) as u32,
    }
}

impl ControllerDef {
    /// Loads a controller document through `source`.
    pub fn load(source: &dyn FileSource, path: &str, settings: &AnimationSettings) -> Result<Self> {
        let file = source.open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => MarionetteError::load(path, "could not open file"),
            _ => MarionetteError::IoError(e),
        })?;
        let doc = JsonDocument::parse(file.bytes())
            .map_err(|e| MarionetteError::load(path, format!("invalid document: {e}")))?;
        Self::parse(doc.root(), path, settings)
    }

    /// Builds a definition from an already parsed document.
    pub fn from_document<N: DocumentNode>(root: N, settings: &AnimationSettings) -> Result<Self> {
        Self::parse(root, "<document>", settings)
    }

    fn parse<N: DocumentNode>(root: N, path: &str, settings: &AnimationSettings) -> Result<Self> {
        let reel_path = root.child_string("reel", "");
        if reel_path.is_empty() {
            return Err(MarionetteError::load(path, "'reel' field is missing or empty"));
        }

        let counts = DefinitionCounts::count(&root);
        check_budget(path, counts.arena_bytes(), settings.max_asset_bytes)?;

        let mut b = DefBuilder::new(path, counts)?;
        b.def.reel_path = reel_path;
        b.params(root.child("params"));
        b.clips(root.child("clips"));
        b.transitions(root.child("transitions"));
        b.blend_trees(root.child("blendtrees"));
        b.states(root.child("states"));
        b.layers(root.child("layers"));
        b.resolve_blend_trees();

        let def = b.def;
        log::debug!(
            "Loaded controller '{path}' (reel '{}'): {} params, {} clips, {} blend trees, {} states, {} transitions, {} layers",
            def.reel_path,
            def.params.len(),
            def.clips.len(),
            def.blend_trees.len(),
            def.states.len(),
            def.transitions.len(),
            def.layers.len()
        );
        Ok(def)
    }
}

struct DefBuilder<'a> {
    path: &'a str,
    counts: DefinitionCounts,
    def: ControllerDef,
}

impl<'a> DefBuilder<'a> {
    fn new(path: &'a str, counts: DefinitionCounts) -> Result<Self> {
        let mut param_lookup = FxHashMap::default();
        param_lookup
            .try_reserve(counts.params)
            .map_err(|_| MarionetteError::out_of_memory(path, counts.arena_bytes()))?;

        let def = ControllerDef {
            reel_path: String::new(),
            params: try_vec_with_capacity(counts.params, path)?,
            param_lookup,
            clips: try_vec_with_capacity(counts.clips, path)?,
            transitions: try_vec_with_capacity(counts.transitions, path)?,
            groups: try_vec_with_capacity(counts.groups, path)?,
            conditions: try_vec_with_capacity(counts.conditions, path)?,
            blend_trees: try_vec_with_capacity(counts.blend_trees, path)?,
            sequences: try_vec_with_capacity(counts.children, path)?,
            states: try_vec_with_capacity(counts.states, path)?,
            layers: try_vec_with_capacity(counts.layers, path)?,
            indices: try_vec_with_capacity(counts.state_transitions + counts.layer_states, path)?,
            bone_masks: try_vec_with_capacity(counts.bone_masks, path)?,
        };
        Ok(Self { path, counts, def })
    }

    /// Validates `raw` against `bound`, logging unresolved references.
    fn index(&self, owner: (&str, usize), what: &str, raw: i64, bound: usize) -> Option<u32> {
        if raw >= 0 && (raw as usize) < bound {
            Some(raw as u32)
        } else {
            log::warn!(
                "{}: {} {} references invalid {what} index {raw}",
                self.path,
                owner.0,
                owner.1
            );
            None
        }
    }

    fn sequence<N: DocumentNode>(&self, node: &N, owner: (&str, usize)) -> Sequence {
        let raw = node.child_int("id", -1);
        match Sequence::parse(&node.child_string("type", ""), 0) {
            Sequence::Clip(_) => self
                .index(owner, "clip", raw, self.counts.clips)
                .map_or(Sequence::Empty, Sequence::Clip),
            Sequence::BlendTree(_) => self
                .index(owner, "blend tree", raw, self.counts.blend_trees)
                .map_or(Sequence::Empty, Sequence::BlendTree),
            Sequence::Empty => {
                log::warn!("{}: {} {} has an unknown sequence type", self.path, owner.0, owner.1);
                Sequence::Empty
            }
        }
    }

    fn index_list<N: DocumentNode>(
        &mut self,
        list: Option<N>,
        owner: (&str, usize),
        what: &str,
        bound: usize,
    ) -> Span {
        let start = self.def.indices.len();
        for item in items_of(list) {
            let raw = item.as_int().unwrap_or(-1);
            if let Some(i) = self.index(owner, what, raw, bound) {
                self.def.indices.push(i);
            }
        }
        span(start, self.def.indices.len())
    }

    fn params<N: DocumentNode>(&mut self, list: Option<N>) {
        for (i, item) in items_of(list).enumerate() {
            let name = item.child_string("name", "");
            let ty = ParamType::parse(&item.child_string("type", "float"));
            let default = read_value(&item, ty);

            match self.def.param_lookup.entry(NameHash::of(&name)) {
                Entry::Occupied(_) => {
                    log::warn!(
                        "{}: duplicate parameter '{name}' is unreachable by name",
                        self.path
                    );
                }
                Entry::Vacant(slot) => {
                    slot.insert(i as u32);
                }
            }
            self.def.params.push(ParamDef { name, default });
        }
    }

    fn clips<N: DocumentNode>(&mut self, list: Option<N>) {
        for item in items_of(list) {
            let name = item.child_string("name", "");
            self.def.clips.push(ClipDef {
                hash: NameHash::of(&name),
                name,
            });
        }
    }

    fn condition<N: DocumentNode>(&self, node: &N, transition: usize) -> Condition {
        let predicate = Predicate::parse(&node.child_string("predicate", ""));
        if predicate == Predicate::Unknown {
            log::warn!(
                "{}: transition {transition} has a condition with an unknown predicate",
                self.path
            );
        }
        let value = read_value(node, ParamType::parse(&node.child_string("value-type", "float")));

        let kind = if node.child_string("type", "exit").eq_ignore_ascii_case("param") {
            let raw = node.child_int("param", -1);
            self.index(("transition", transition), "parameter", raw, self.counts.params)
                .map_or(ConditionKind::Unresolved, ConditionKind::Param)
        } else {
            ConditionKind::ExitTime
        };

        Condition {
            kind,
            predicate,
            value,
        }
    }

    fn transitions<N: DocumentNode>(&mut self, list: Option<N>) {
        let states = self.counts.states;
        for (i, item) in items_of(list).enumerate() {
            let owner = ("transition", i);
            let duration = item.child_float("duration", 0.0);
            let from = self.index(owner, "owner state", item.child_int("owner", -1), states);
            let to = self.index(owner, "target state", item.child_int("target", -1), states);

            let groups_start = self.def.groups.len();
            for group in items_of(item.child("groups")) {
                let start = self.def.conditions.len();
                for node in items_of(group.child("conditions")) {
                    let cond = self.condition(&node, i);
                    self.def.conditions.push(cond);
                }
                let group_span = span(start, self.def.conditions.len());
                self.def.groups.push(group_span);
            }

            self.def.transitions.push(TransitionDef {
                duration,
                owner: from,
                target: to,
                groups: span(groups_start, self.def.groups.len()),
            });
        }
    }

    fn blend_trees<N: DocumentNode>(&mut self, list: Option<N>) {
        for (i, item) in items_of(list).enumerate() {
            let owner = ("blend tree", i);
            let name = item.child_string("name", "");
            let param =
                self.index(owner, "parameter", item.child_int("param", -1), self.counts.params);
            if let Some(p) = param
                && self.def.params[p as usize].param_type() != ParamType::Float
            {
                log::warn!(
                    "{}: blend tree '{name}' is driven by non-float parameter '{}'",
                    self.path,
                    self.def.params[p as usize].name
                );
            }

            let start = self.def.sequences.len();
            for child in items_of(item.child("childs")) {
                let seq = self.sequence(&child, owner);
                self.def.sequences.push(seq);
            }
            let children = span(start, self.def.sequences.len());
            if children.is_empty() {
                log::warn!("{}: blend tree '{name}' has no children", self.path);
            }

            self.def.blend_trees.push(BlendTreeDef {
                name,
                param,
                children,
            });
        }
    }

    fn states<N: DocumentNode>(&mut self, list: Option<N>) {
        let transitions = self.counts.transitions;
        for (i, item) in items_of(list).enumerate() {
            let owner = ("state", i);
            let name = item.child_string("name", "");
            let speed = item.child_float("speed", 1.0);
            let sequence = item
                .child("sequence")
                .map_or(Sequence::Empty, |s| self.sequence(&s, owner));
            let outgoing =
                self.index_list(item.child("transitions"), owner, "transition", transitions);

            self.def.states.push(StateDef {
                name,
                speed,
                sequence,
                transitions: outgoing,
            });
        }
    }

    fn layers<N: DocumentNode>(&mut self, list: Option<N>) {
        let states = self.counts.states;
        for (i, item) in items_of(list).enumerate() {
            let owner = ("layer", i);
            let name = item.child_string("name", "");
            let blend = LayerBlend::parse(&item.child_string("layer", ""));
            let default_state =
                self.index(owner, "default state", item.child_int("default", -1), states);
            let members = self.index_list(item.child("states"), owner, "state", states);

            let start = self.def.bone_masks.len();
            for entry in items_of(item.child("bone-mask")) {
                match entry.as_str() {
                    Some(bone) => self.def.bone_masks.push(bone.to_owned()),
                    None => log::warn!(
                        "{}: layer '{name}' has a non-string bone-mask entry",
                        self.path
                    ),
                }
            }
            let bone_mask = span(start, self.def.bone_masks.len());

            self.def.layers.push(LayerDef {
                name,
                blend,
                default_state,
                states: members,
                bone_mask,
            });
        }
    }

    /// Empties references to childless blend trees and breaks nesting cycles.
    fn resolve_blend_trees(&mut self) {
        let def = &mut self.def;
        let childless: Vec<bool> =
            def.blend_trees.iter().map(|bt| bt.children.is_empty()).collect();
        let prune = |seq: &mut Sequence| {
            if let Sequence::BlendTree(i) = *seq
                && childless[i as usize]
            {
                *seq = Sequence::Empty;
            }
        };
        def.sequences.iter_mut().for_each(prune);
        def.states.iter_mut().for_each(|s| prune(&mut s.sequence));

        let mut marks = vec![Mark::New; def.blend_trees.len()];
        for tree in 0..def.blend_trees.len() {
            if marks[tree] == Mark::New {
                visit(tree, &def.blend_trees, &mut def.sequences, &mut marks, self.path);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    New,
    Active,
    Done,
}

fn visit(
    tree: usize,
    trees: &[BlendTreeDef],
    seqs: &mut [Sequence],
    marks: &mut [Mark],
    path: &str,
) {
    marks[tree] = Mark::Active;
    let children = trees[tree].children;
    for slot in children.range() {
        let Sequence::BlendTree(child) = seqs[slot] else {
            continue;
        };
        let child = child as usize;
        match marks[child] {
            Mark::Active => {
                log::warn!(
                    "{path}: blend tree '{}' nests '{}' cyclically; child {} ignored",
                    trees[tree].name,
                    trees[child].name,
                    slot - children.start as usize
                );
                seqs[slot] = Sequence::Empty;
            }
            Mark::New => visit(child, trees, seqs, marks, path),
            Mark::Done => {}
        }
    }
    marks[tree] = Mark::Done;
}
