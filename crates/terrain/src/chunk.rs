use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::TerrainError;
use crate::mesh::ChunkModel;
use crate::render::ChunkRenderCache;
use crate::types::ChunkKey;

#[derive(Default)]
struct ChunkState {
    model: Option<ChunkModel>,
    render_cache: Option<Arc<ChunkRenderCache>>,
}

/// One square of terrain. The model and its render cache are swapped together
/// under one lock, so a reader sees either the old pair or the new one.
pub struct Chunk {
    key: ChunkKey,
    state: Mutex<ChunkState>,
}

impl Chunk {
    pub fn new(key: ChunkKey) -> Self {
        Self {
            key,
            state: Mutex::new(ChunkState::default()),
        }
    }

    pub fn key(&self) -> ChunkKey {
        self.key
    }

    /// Replaces the current model, dropping the old one and its render cache.
    pub fn set_model(&self, model: ChunkModel) {
        debug_assert_eq!(model.key(), self.key);
        let mut state = self.state();
        state.model = Some(model);
        state.render_cache = None;
    }

    pub fn has_model(&self) -> bool {
        self.state().model.is_some()
    }

    pub fn with_model<R>(&self, f: impl FnOnce(&ChunkModel) -> R) -> Option<R> {
        self.state().model.as_ref().map(f)
    }

    /// Runs a read-modify-write on the model. Edits on one chunk are serialized.
    pub fn edit(
        &self,
        f: impl FnOnce(&ChunkModel) -> Result<ChunkModel, TerrainError>,
    ) -> Result<(), TerrainError> {
        let mut state = self.state();
        let current = state
            .model
            .as_ref()
            .ok_or(TerrainError::MissingModel(self.key))?;
        let edited = f(current)?;
        state.model = Some(edited);
        state.render_cache = None;
        Ok(())
    }

    /// Render cache of the current model, built on first use.
    pub fn render_cache(&self) -> Option<Arc<ChunkRenderCache>> {
        let mut state = self.state();
        if let Some(cache) = &state.render_cache {
            return Some(Arc::clone(cache));
        }
        let cache = Arc::new(ChunkRenderCache::from_model(state.model.as_ref()?));
        state.render_cache = Some(Arc::clone(&cache));
        Some(cache)
    }

    /// Drops the model and render cache. Returns false if there was nothing to release.
    pub fn dispose(&self) -> bool {
        let mut state = self.state();
        let had_model = state.model.take().is_some();
        let had_cache = state.render_cache.take().is_some();
        had_model || had_cache
    }

    fn state(&self) -> MutexGuard<'_, ChunkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("key", &self.key)
            .field("has_model", &self.has_model())
            .finish()
    }
}
