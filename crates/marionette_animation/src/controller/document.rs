//! Serialization back into the controller document format.

use serde_json::{Value, json};

use super::{ConditionKind, ControllerDef, Sequence};
use crate::params::ParamValue;

fn value_json(v: ParamValue) -> Value {
    match v {
        ParamValue::Int(i) => json!(i),
        ParamValue::Float(f) => json!(f),
        ParamValue::Bool(b) => json!(b),
    }
}

fn sequence_json(seq: Sequence) -> Value {
    match seq {
        Sequence::Clip(i) => json!({"type": "clip", "id": i}),
        Sequence::BlendTree(i) => json!({"type": "blendtree", "id": i}),
        Sequence::Empty => json!({"type": "", "id": -1}),
    }
}

fn index_json(index: Option<u32>) -> Value {
    index.map_or(json!(-1), |i| json!(i))
}

impl ControllerDef {
    /// Writes the definition as a controller document that
    /// [`ControllerDef::from_document`] reads back unchanged.
    #[must_use]
    pub fn to_document(&self) -> Value {
        let params: Vec<Value> = self
            .params
            .iter()
            .map(|p| {
                json!({
                    "name": p.name,
                    "type": p.param_type().as_str(),
                    "value": value_json(p.default),
                })
            })
            .collect();

        let clips: Vec<Value> = self.clips.iter().map(|c| json!({"name": c.name})).collect();

        let transitions: Vec<Value> = self
            .transitions
            .iter()
            .map(|t| {
                let groups: Vec<Value> = self
                    .transition_groups(t)
                    .map(|conds| {
                        let conditions: Vec<Value> = conds
                            .iter()
                            .map(|c| {
                                let mut node = json!({
                                    "predicate": c.predicate.as_str(),
                                    "value-type": c.value.param_type().as_str(),
                                    "value": value_json(c.value),
                                });
                                match c.kind {
                                    ConditionKind::ExitTime => node["type"] = json!("exit"),
                                    ConditionKind::Param(p) => {
                                        node["type"] = json!("param");
                                        node["param"] = json!(p);
                                    }
                                    ConditionKind::Unresolved => {
                                        node["type"] = json!("param");
                                        node["param"] = json!(-1);
                                    }
                                }
                                node
                            })
                            .collect();
                        json!({"conditions": conditions})
                    })
                    .collect();
                json!({
                    "duration": t.duration,
                    "owner": index_json(t.owner),
                    "target": index_json(t.target),
                    "groups": groups,
                })
            })
            .collect();

        let blendtrees: Vec<Value> = self
            .blend_trees
            .iter()
            .map(|bt| {
                let childs: Vec<Value> = self
                    .blend_tree_children(bt)
                    .iter()
                    .map(|&s| sequence_json(s))
                    .collect();
                json!({"name": bt.name, "param": index_json(bt.param), "childs": childs})
            })
            .collect();

        let states: Vec<Value> = self
            .states
            .iter()
            .map(|s| {
                json!({
                    "name": s.name,
                    "speed": s.speed,
                    "sequence": sequence_json(s.sequence),
                    "transitions": self.state_transitions(s),
                })
            })
            .collect();

        let layers: Vec<Value> = self
            .layers
            .iter()
            .map(|l| {
                json!({
                    "name": l.name,
                    "default": index_json(l.default_state),
                    "layer": l.blend.as_str(),
                    "states": self.layer_states(l),
                    "bone-mask": self.layer_bone_mask(l),
                })
            })
            .collect();

        json!({
            "reel": self.reel_path,
            "params": params,
            "clips": clips,
            "transitions": transitions,
            "blendtrees": blendtrees,
            "states": states,
            "layers": layers,
        })
    }
}
