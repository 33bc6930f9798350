//! Animation Runtime Settings
//!
//! Budgets and defaults handed to loaders, the reel library and instance
//! creation. There is no global configuration; every consumer receives the
//! settings it should use.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use marionette_animation::AnimationSettings;
//!
//! // Defaults: 64 MiB per asset, playrate 1.0, 64 KiB scratch
//! let settings = AnimationSettings::default();
//!
//! // Tighter budget for a mobile build
//! let settings = AnimationSettings {
//!     max_asset_bytes: 8 << 20,
//!     ..Default::default()
//! };
//!
//! let scratch = settings.scratch_arena();
//! ```

use bumpalo::Bump;

/// Configuration for the animation runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationSettings {
    /// Upper bound on the exact arena size computed for a single reel or
    /// controller definition. Larger assets fail with `OutOfMemory`.
    pub max_asset_bytes: usize,

    /// Playback-rate multiplier given to newly created instances.
    pub default_playrate: f32,

    /// Initial capacity of scratch arenas created by [`Self::scratch_arena`].
    ///
    /// Blend trees and transitions allocate two pose buffers per nesting
    /// level from the scratch arena, so a rough size is
    /// `2 * depth * pose_count * 32` bytes.
    pub scratch_bytes: usize,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            max_asset_bytes: 64 << 20,
            default_playrate: 1.0,
            scratch_bytes: 64 << 10,
        }
    }
}

impl AnimationSettings {
    /// Creates a bump arena suitable for per-frame evaluation scratch.
    ///
    /// Reset it (`Bump::reset`) once per frame after all instances on the
    /// owning thread have been updated.
    #[must_use]
    pub fn scratch_arena(&self) -> Bump {
        Bump::with_capacity(self.scratch_bytes)
    }
}
