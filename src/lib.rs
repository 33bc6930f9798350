//! # Marionette
//!
//! Data-driven character animation runtime. Keyframe reels are driven by
//! layered state machines with blend trees and timed transitions, then
//! composited and written into skeleton joint matrices or scene nodes.
//!
//! This umbrella crate re-exports:
//! - [`core`]: errors, name hashing, document and file services
//! - [`animation`]: reels, controllers, instances, evaluation and binding
//!
//! ```rust,ignore
//! use marionette::prelude::*;
//!
//! let source = Arc::new(DiskFileSource::new("assets"));
//! let settings = AnimationSettings::default();
//! let reels = ReelLibrary::new(source.clone(), settings.clone());
//! let def = Arc::new(ControllerDef::load(source.as_ref(), "hero.json", &settings)?);
//! let mut inst = ControllerInstance::new(def, &reels, &settings)?;
//!
//! let mut scratch = settings.scratch_arena();
//! inst.set_float("speed", 0.5);
//! inst.update(time, &scratch);
//! inst.fetch_result(&bindmap, &mut joints);
//! scratch.reset();
//! ```

pub use marionette_animation as animation;
pub use marionette_core as core;

pub use marionette_animation::{
    AnimationSettings, BindMap, ControllerDef, ControllerInstance, JointHierarchy, LayerMode,
    ParamType, ParamValue, Pose, Reel, ReelBuilder, ReelHandle, ReelLibrary, TransformSink,
};
pub use marionette_core::{
    DiskFileSource, FileSource, JsonDocument, MarionetteError, MemoryFileSource, Result,
};

pub mod prelude {
    pub use std::sync::Arc;

    pub use glam::{Affine3A, Quat, Vec3};

    pub use crate::{
        AnimationSettings, BindMap, ControllerDef, ControllerInstance, DiskFileSource, FileSource,
        JointHierarchy, JsonDocument, LayerMode, MarionetteError, MemoryFileSource, ParamType,
        ParamValue, Pose, Reel, ReelBuilder, ReelHandle, ReelLibrary, Result, TransformSink,
    };
}
