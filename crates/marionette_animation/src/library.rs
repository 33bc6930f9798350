//! Reel library
//!
//! Handle-based storage for loaded reels. Reels are kept as `Arc<Reel>` in a
//! `SlotMap`; a path lookup deduplicates loads so that every controller
//! instance referencing `hero.h3da` shares one reel.
//!
//! Hot reload replaces the `Arc` stored under an existing handle. Instances
//! holding the old reel keep it alive until they rebind with
//! `ControllerInstance::set_reel`.

use std::sync::Arc;

use marionette_core::{FileSource, MarionetteError, Result};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};

use crate::reel::Reel;
use crate::settings::AnimationSettings;

new_key_type! {
    /// Handle to a reel stored in a [`ReelLibrary`].
    pub struct ReelHandle;
}

#[derive(Default)]
struct LibraryInner {
    reels: SlotMap<ReelHandle, Arc<Reel>>,
    paths: FxHashMap<String, ReelHandle>,
}

/// Thread-safe reel storage.
pub struct ReelLibrary {
    source: Arc<dyn FileSource>,
    settings: AnimationSettings,
    inner: RwLock<LibraryInner>,
}

impl ReelLibrary {
    pub fn new(source: Arc<dyn FileSource>, settings: AnimationSettings) -> Self {
        Self {
            source,
            settings,
            inner: RwLock::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &AnimationSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn source(&self) -> &Arc<dyn FileSource> {
        &self.source
    }

    /// Loads the reel at `path`, or returns the handle of an earlier load.
    pub fn load(&self, path: &str) -> Result<ReelHandle> {
        if let Some(handle) = self.handle_of(path) {
            return Ok(handle);
        }

        // Load outside the lock; a concurrent load of the same path keeps
        // whichever handle was registered first.
        let reel = Reel::load(self.source.as_ref(), path, &self.settings).inspect_err(|e| {
            log::error!("Failed to load reel '{path}': {e}");
        })?;
        Ok(self.insert(path, reel))
    }

    /// Registers an already-built reel under `path`.
    pub fn insert(&self, path: &str, reel: Reel) -> ReelHandle {
        let mut guard = self.inner.write();
        if let Some(&handle) = guard.paths.get(path) {
            return handle;
        }
        let handle = guard.reels.insert(Arc::new(reel));
        guard.paths.insert(path.to_owned(), handle);
        handle
    }

    #[must_use]
    pub fn get(&self, handle: ReelHandle) -> Option<Arc<Reel>> {
        self.inner.read().reels.get(handle).cloned()
    }

    #[must_use]
    pub fn handle_of(&self, path: &str) -> Option<ReelHandle> {
        self.inner.read().paths.get(path).copied()
    }

    /// Re-reads the file behind `handle` and swaps in the new reel.
    pub fn reload(&self, handle: ReelHandle) -> Result<()> {
        let path = {
            let guard = self.inner.read();
            guard
                .paths
                .iter()
                .find_map(|(p, &h)| (h == handle).then(|| p.clone()))
        };
        let Some(path) = path else {
            return Err(MarionetteError::load(
                format!("{handle:?}"),
                "reload of unknown reel handle",
            ));
        };

        let reel = Reel::load(self.source.as_ref(), &path, &self.settings).inspect_err(|e| {
            log::error!("Failed to reload reel '{path}': {e}");
        })?;
        if let Some(slot) = self.inner.write().reels.get_mut(handle) {
            *slot = Arc::new(reel);
            log::debug!("Reloaded reel '{path}'");
        }
        Ok(())
    }

    /// Drops the library's reference. Bound instances keep their `Arc`.
    pub fn unload(&self, handle: ReelHandle) -> bool {
        let mut guard = self.inner.write();
        let removed = guard.reels.remove(handle).is_some();
        if removed {
            guard.paths.retain(|_, h| *h != handle);
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().reels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
