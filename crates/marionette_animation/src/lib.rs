//! Marionette Animation
//!
//! Data-driven character animation runtime:
//!
//! - [`reel`]: sampled keyframe data and named clips, loaded from `.h3da`
//! - [`library`]: handle-based, deduplicated reel storage with hot reload
//! - [`controller`]: shared state machine definitions loaded from JSON
//! - [`instance`]: per-character parameters and layer state
//! - [`evaluator`]: per-frame state machine, blend tree and transition update
//! - [`binding`]: layer compositing and output to skeletons or node hierarchies

pub mod binding;
pub mod controller;
pub mod evaluator;
pub mod instance;
pub mod library;
pub mod params;
pub mod pose;
pub mod reel;
pub mod settings;

pub use binding::{BindMap, JointHierarchy, TransformSink};
pub use controller::{
    Condition, ConditionKind, ControllerDef, DefinitionCounts, LayerBlend, Sequence, Span,
};
pub use instance::{ControllerInstance, LayerMode, StateSnapshot, TransitionSnapshot};
pub use library::{ReelHandle, ReelLibrary};
pub use params::{ParamType, ParamValue, Predicate};
pub use pose::Pose;
pub use reel::{Reel, ReelBuilder, ReelClip, ReelInfo};
pub use settings::AnimationSettings;
