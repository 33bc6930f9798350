//! Controller Tests
//!
//! Tests for:
//! - Definition loading: counting pass, tolerant parsing, index sanitizing
//! - Document round trip
//! - Instance parameters (typed get/set, coercion, unknown names)
//! - Clip evaluation: exact first frame, monotonic progress, loop wrap
//! - Blend trees: endpoints and spherical interpolation
//! - Transitions: parameter and exit-time conditions, OR-of-AND groups

use std::sync::Arc;

use bumpalo::Bump;
use glam::{Quat, Vec3};
use serde_json::{Value, json};

use marionette::animation::controller::{ConditionKind, LayerBlend, Sequence};
use marionette::animation::params::Predicate;
use marionette::prelude::*;

const EPSILON: f32 = 1e-4;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

fn pose(x: f32, angle: f32) -> Pose {
    Pose::new(Vec3::new(x, 0.0, 0.0), 1.0, Quat::from_rotation_z(angle))
}

/// One joint at 10 fps:
/// - "idle" frames 0-3 (looped, 0.4s), x = 0..3
/// - "walk" frames 4-5 (looped, 0.2s), x = 100..101, rotated 1 rad
/// - "land" frames 6-9 (once, 0.4s), x = 6..9
fn library() -> ReelLibrary {
    let mut b = ReelBuilder::new("hero", 10);
    b.bind("hips");
    for x in [0.0, 1.0, 2.0, 3.0] {
        b.frame(vec![pose(x, 0.0)]);
    }
    b.frame(vec![pose(100.0, 1.0)]).frame(vec![pose(101.0, 1.0)]);
    for x in [6.0, 7.0, 8.0, 9.0] {
        b.frame(vec![pose(x, 0.0)]);
    }
    b.clip("idle", 0, 4, true).clip("walk", 4, 6, true).clip("land", 6, 10, false);

    let fs = Arc::new(MemoryFileSource::new());
    fs.insert("hero.h3da", b.encode());
    ReelLibrary::new(fs, AnimationSettings::default())
}

fn definition(doc: Value) -> ControllerDef {
    let doc = JsonDocument::from_value(doc);
    ControllerDef::from_document(doc.root(), &AnimationSettings::default()).unwrap()
}

fn instance(doc: Value) -> ControllerInstance {
    let settings = AnimationSettings::default();
    ControllerInstance::new(Arc::new(definition(doc)), &library(), &settings).unwrap()
}

fn single_state(sequence: Value, extra_params: Value) -> Value {
    json!({
        "reel": "hero.h3da",
        "params": extra_params,
        "clips": [{"name": "idle"}, {"name": "walk"}, {"name": "land"}],
        "blendtrees": [{"name": "move", "param": 0, "childs": [
            {"type": "clip", "id": 0}, {"type": "clip", "id": 1}
        ]}],
        "states": [{"name": "Main", "sequence": sequence}],
        "layers": [{"name": "base", "default": 0, "states": [0]}]
    })
}

fn x(inst: &ControllerInstance) -> f32 {
    inst.layer_poses(0).unwrap()[0].position().x
}

// ============================================================================
// Definition Loading
// ============================================================================

#[test]
fn full_document_counts() {
    let def = definition(json!({
        "reel": "hero.h3da",
        "params": [{"name": "speed", "type": "float"}, {"name": "grounded", "type": "bool", "value": true}],
        "clips": [{"name": "idle"}, {"name": "walk"}],
        "transitions": [
            {"duration": 0.2, "owner": 0, "target": 1, "groups": [
                {"conditions": [{"type": "param", "param": 0, "predicate": ">", "value": 0.1}]},
                {"conditions": [
                    {"type": "exit", "predicate": "==", "value": 1.0},
                    {"type": "param", "param": 1, "predicate": "==", "value": true}
                ]}
            ]}
        ],
        "states": [
            {"name": "Idle", "sequence": {"type": "CLIP", "id": 0}, "transitions": [0]},
            {"name": "Walk", "sequence": {"type": "clip", "id": 1}}
        ],
        "layers": [{"name": "base", "default": 0, "states": [0, 1], "bone-mask": []}]
    }));

    let counts = def.counts();
    assert_eq!(counts.params, 2);
    assert_eq!(counts.transitions, 1);
    assert_eq!(counts.groups, 2);
    assert_eq!(counts.conditions, 3);
    assert_eq!(counts.states, 2);
    assert_eq!(counts.layer_states, 2);

    assert_eq!(def.states()[0].sequence, Sequence::Clip(0));
    let groups: Vec<_> = def.transition_groups(&def.transitions()[0]).collect();
    assert_eq!(groups[1][0].kind, ConditionKind::ExitTime);
    assert_eq!(groups[1][1].kind, ConditionKind::Param(1));
    assert_eq!(groups[0][0].predicate, Predicate::Greater);
    assert_eq!(def.param_index("grounded"), Some(1));
    assert_eq!(def.state_index("Walk"), Some(1));
}

#[test]
fn missing_reel_is_load_error() {
    let doc = JsonDocument::from_value(json!({"states": []}));
    let err = ControllerDef::from_document(doc.root(), &AnimationSettings::default()).unwrap_err();
    assert!(matches!(err, MarionetteError::Load { .. }));
}

#[test]
fn load_from_file_source() {
    let fs = MemoryFileSource::new();
    fs.insert("hero.json", br#"{"reel": "hero.h3da", "clips": [{"name": "idle"}]}"#.to_vec());
    let def = ControllerDef::load(&fs, "hero.json", &AnimationSettings::default()).unwrap();
    assert_eq!(def.reel_path(), "hero.h3da");
    assert_eq!(def.clips().len(), 1);

    fs.insert("broken.json", b"{ not json".to_vec());
    assert!(ControllerDef::load(&fs, "broken.json", &AnimationSettings::default()).is_err());
}

#[test]
fn invalid_references_are_sanitized() {
    let def = definition(json!({
        "reel": "hero.h3da",
        "clips": [{"name": "idle"}],
        "transitions": [{"duration": 0.1, "owner": 0, "target": 9, "groups": [
            {"conditions": [{"type": "param", "param": 4, "predicate": "==", "value": 1}]}
        ]}],
        "states": [
            {"name": "A", "sequence": {"type": "clip", "id": 3}, "transitions": [0, 7]},
            {"name": "B", "sequence": {"type": "wobble", "id": 0}}
        ],
        "layers": [{"name": "base", "default": 5, "layer": "strange", "states": [0, 1, 2]}]
    }));

    assert_eq!(def.transitions()[0].target, None);
    assert_eq!(def.states()[0].sequence, Sequence::Empty);
    assert_eq!(def.states()[1].sequence, Sequence::Empty);
    assert_eq!(def.state_transitions(&def.states()[0]), &[0]);
    let layer = &def.layers()[0];
    assert_eq!(layer.default_state, None);
    assert_eq!(def.layer_states(layer), &[0, 1]);

    let group = def.transition_groups(&def.transitions()[0]).next().unwrap();
    assert_eq!(group[0].kind, ConditionKind::Unresolved);
}

#[test]
fn document_round_trip_preserves_definition() {
    let source = single_state(
        json!({"type": "blendtree", "id": 0}),
        json!([{"name": "mix", "type": "float", "value": 0.25}]),
    );
    let first = definition(source);
    let second = definition(first.to_document());
    assert_eq!(first.counts(), second.counts());
    assert_eq!(first.states(), second.states());
    assert_eq!(first.blend_trees(), second.blend_trees());
    assert_eq!(first.params(), second.params());
}

#[test]
fn document_round_trip_preserves_transitions_and_layers() {
    let first = definition(json!({
        "reel": "hero.h3da",
        "params": [
            {"name": "speed", "type": "float", "value": 0.5},
            {"name": "lives", "type": "int", "value": 3},
            {"name": "armed", "type": "bool", "value": true}
        ],
        "clips": [{"name": "idle"}, {"name": "walk"}],
        "transitions": [{
            "duration": 0.3,
            "owner": 0,
            "target": 1,
            "groups": [
                {"conditions": [
                    {"type": "param", "param": 0, "predicate": ">", "value-type": "float", "value": 0.1},
                    {"type": "param", "param": 1, "predicate": "!=", "value-type": "int", "value": 0}
                ]},
                {"conditions": [
                    {"type": "param", "param": 2, "predicate": "<", "value-type": "bool", "value": true}
                ]},
                {"conditions": [{"type": "exit", "predicate": ">", "value": 0.9}]}
            ]
        }],
        "states": [
            {"name": "Idle", "speed": 1.0, "sequence": {"type": "clip", "id": 0}, "transitions": [0]},
            {"name": "Walk", "speed": 1.25, "sequence": {"type": "clip", "id": 1}}
        ],
        "layers": [
            {"name": "base", "default": 0, "layer": "override", "states": [0, 1]},
            {"name": "upper", "default": 1, "layer": "additive", "states": [1],
             "bone-mask": ["spine", "head"]}
        ]
    }));
    let second = definition(first.to_document());

    assert_eq!(first.params(), second.params());
    assert_eq!(first.states(), second.states());
    assert_eq!(first.transitions(), second.transitions());
    let groups_a: Vec<_> = first.transition_groups(&first.transitions()[0]).collect();
    let groups_b: Vec<_> = second.transition_groups(&second.transitions()[0]).collect();
    assert_eq!(groups_a.len(), 3);
    assert_eq!(groups_a, groups_b);
    assert_eq!(groups_b[0][1].predicate, Predicate::NotEqual);
    assert_eq!(groups_b[2][0].kind, ConditionKind::ExitTime);

    assert_eq!(first.layers(), second.layers());
    let upper = &second.layers()[1];
    assert_eq!(upper.blend, LayerBlend::Additive);
    assert_eq!(second.layer_bone_mask(upper), &["spine", "head"]);
    assert_eq!(first.layer_bone_mask(&first.layers()[1]), second.layer_bone_mask(upper));
}

// ============================================================================
// Parameters
// ============================================================================

#[test]
fn typed_parameters() {
    let mut inst = instance(single_state(
        json!({"type": "clip", "id": 0}),
        json!([
            {"name": "speed", "type": "float", "value": 0.5},
            {"name": "lives", "type": "int", "value": 3},
            {"name": "alive", "type": "bool", "value": true}
        ]),
    ));

    assert_eq!(inst.float_param("speed"), Some(0.5));
    assert_eq!(inst.int_param("lives"), Some(3));
    assert_eq!(inst.bool_param("alive"), Some(true));
    assert_eq!(inst.param_type("lives"), Some(ParamType::Int));

    assert!(inst.set_int("lives", 2));
    assert_eq!(inst.param("lives"), Some(ParamValue::Int(2)));

    // Wrong type is converted to the declared type.
    assert!(inst.set_float("lives", 7.9));
    assert_eq!(inst.param("lives"), Some(ParamValue::Int(7)));

    assert!(!inst.set_bool("missing", true));
    assert_eq!(inst.param("missing"), None);
}

// ============================================================================
// Clip Evaluation
// ============================================================================

#[test]
fn clip_starts_on_first_frame() {
    let mut inst = instance(single_state(json!({"type": "clip", "id": 2}), json!([])));
    let scratch = Bump::new();
    inst.update(3.0, &scratch);
    assert_eq!(inst.layer_poses(0).unwrap()[0], pose(6.0, 0.0));
}

#[test]
fn non_looped_progress_is_monotonic_and_saturates() {
    let mut inst = instance(single_state(json!({"type": "clip", "id": 2}), json!([])));
    let scratch = Bump::new();
    inst.update(0.0, &scratch);

    let mut last = 0.0;
    for i in 1..=12 {
        inst.update(i as f32 * 0.05, &scratch);
        let progress = inst.current_state("base").unwrap().progress;
        assert!(progress >= last, "progress went backwards at step {i}");
        last = progress;
    }
    assert!(approx(last, 1.0));
    assert!(approx(x(&inst), 9.0));
}

#[test]
fn near_end_approaches_last_frame() {
    let mut inst = instance(single_state(json!({"type": "clip", "id": 2}), json!([])));
    let scratch = Bump::new();
    inst.update(0.0, &scratch);
    inst.update(0.399, &scratch);
    assert!((x(&inst) - 9.0).abs() < 0.02);
}

#[test]
fn looped_clip_wrap_is_idempotent() {
    let mut inst = instance(single_state(json!({"type": "clip", "id": 0}), json!([])));
    let scratch = Bump::new();
    inst.update(0.0, &scratch);

    for delta in [0.0_f32, 0.05, 0.13, 0.25, 0.35] {
        inst.update(delta, &scratch);
        let first = inst.layer_poses(0).unwrap()[0];
        inst.update(0.4 + delta, &scratch);
        let wrapped = inst.layer_poses(0).unwrap()[0];
        assert!(
            first.pos_scale.abs_diff_eq(wrapped.pos_scale, EPSILON),
            "delta {delta}: {first:?} vs {wrapped:?}"
        );
    }
}

#[test]
fn playrate_scales_clip_time() {
    let mut inst = instance(single_state(json!({"type": "clip", "id": 2}), json!([])));
    inst.set_playrate(2.0);
    let scratch = Bump::new();
    inst.update(0.0, &scratch);
    inst.update(0.1, &scratch);
    assert!(approx(x(&inst), 8.0));
}

// ============================================================================
// Blend Trees
// ============================================================================

fn blend_tree_instance(mix: f32) -> ControllerInstance {
    instance(single_state(
        json!({"type": "blendtree", "id": 0}),
        json!([{"name": "mix", "type": "float", "value": mix}]),
    ))
}

#[test]
fn blend_tree_endpoints_are_exact() {
    let scratch = Bump::new();

    let mut zero = blend_tree_instance(0.0);
    zero.update(0.0, &scratch);
    assert_eq!(zero.layer_poses(0).unwrap()[0], pose(0.0, 0.0));

    let mut one = blend_tree_instance(1.0);
    one.update(0.0, &scratch);
    assert_eq!(one.layer_poses(0).unwrap()[0], pose(100.0, 1.0));
}

#[test]
fn blend_tree_midpoint_slerps() {
    let mut inst = blend_tree_instance(0.3);
    let scratch = Bump::new();
    inst.update(0.0, &scratch);
    let p = inst.layer_poses(0).unwrap()[0];
    let expected = Quat::IDENTITY.slerp(Quat::from_rotation_z(1.0), 0.3);
    assert!(p.rot.abs_diff_eq(expected, EPSILON));
    assert!(approx(p.position().x, 30.0));
}

#[test]
fn blend_tree_parameter_is_clamped() {
    let mut inst = blend_tree_instance(0.0);
    inst.set_float("mix", -3.0);
    let scratch = Bump::new();
    inst.update(0.0, &scratch);
    assert_eq!(inst.layer_poses(0).unwrap()[0], pose(0.0, 0.0));
}

// ============================================================================
// Transitions
// ============================================================================

fn transition_doc(groups: Value) -> Value {
    json!({
        "reel": "hero.h3da",
        "params": [{"name": "speed", "type": "float"}, {"name": "armed", "type": "bool"}],
        "clips": [{"name": "land"}, {"name": "walk"}],
        "transitions": [{"duration": 0.1, "owner": 0, "target": 1, "groups": groups}],
        "states": [
            {"name": "Land", "sequence": {"type": "clip", "id": 0}, "transitions": [0]},
            {"name": "Walk", "sequence": {"type": "clip", "id": 1}}
        ],
        "layers": [{"name": "base", "default": 0, "states": [0, 1]}]
    })
}

#[test]
fn exit_time_waits_for_completion() {
    let mut inst = instance(transition_doc(json!([
        {"conditions": [{"type": "exit", "predicate": "==", "value": 1.0}]}
    ])));
    let scratch = Bump::new();
    inst.update(0.0, &scratch);

    let mut t = 0.0;
    while t < 0.39 {
        t += 0.05;
        inst.update(t, &scratch);
        assert_eq!(inst.layer_mode(0), Some(LayerMode::InState(0)), "fired early at {t}");
    }

    // Progress reached 1 on the last update; the next one starts the crossfade.
    inst.update(0.45, &scratch);
    assert_eq!(inst.layer_mode(0), Some(LayerMode::InTransition(0)));

    inst.update(0.6, &scratch);
    assert_eq!(inst.layer_mode(0), Some(LayerMode::InState(1)));
    assert!(inst.current_transition("base").is_none());
    assert_eq!(inst.current_state("base").unwrap().name, "Walk");
}

#[test]
fn any_satisfied_group_fires() {
    let doc = transition_doc(json!([
        {"conditions": [
            {"type": "param", "param": 0, "predicate": ">", "value": 0.5},
            {"type": "param", "param": 1, "predicate": "==", "value": true}
        ]},
        {"conditions": [{"type": "param", "param": 0, "predicate": "<", "value": -1.0}]}
    ]));
    let scratch = Bump::new();

    // First group only half satisfied.
    let mut inst = instance(doc.clone());
    inst.update(0.0, &scratch);
    inst.set_float("speed", 1.0);
    inst.update(0.05, &scratch);
    assert_eq!(inst.layer_mode(0), Some(LayerMode::InState(0)));
    inst.set_bool("armed", true);
    inst.update(0.1, &scratch);
    assert_eq!(inst.layer_mode(0), Some(LayerMode::InTransition(0)));

    // Second group alone.
    let mut inst = instance(doc);
    inst.update(0.0, &scratch);
    inst.set_float("speed", -2.0);
    inst.update(0.05, &scratch);
    assert_eq!(inst.layer_mode(0), Some(LayerMode::InTransition(0)));
}

#[test]
fn float_equality_uses_epsilon() {
    let mut inst = instance(transition_doc(json!([
        {"conditions": [{"type": "param", "param": 0, "predicate": "==", "value": 0.3}]}
    ])));
    let scratch = Bump::new();
    inst.update(0.0, &scratch);
    inst.set_float("speed", 0.1 + 0.2);
    inst.update(0.05, &scratch);
    assert_eq!(inst.layer_mode(0), Some(LayerMode::InTransition(0)));
}

#[test]
fn transition_blend_is_reported() {
    let mut inst = instance(transition_doc(json!([
        {"conditions": [{"type": "param", "param": 1, "predicate": "==", "value": true}]}
    ])));
    let scratch = Bump::new();
    inst.update(0.0, &scratch);
    inst.set_bool("armed", true);
    inst.update(0.1, &scratch);
    inst.update(0.15, &scratch);

    let snap = inst.current_transition("base").unwrap();
    assert_eq!(snap.from, "Land");
    assert_eq!(snap.to, "Walk");
    assert!(approx(snap.blend, 0.5));
    assert!(inst.debug_report().contains("transition: 0"));
}
