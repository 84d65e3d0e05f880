//! Lazy subtree loading.

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::transport::RemoteTransport;
use docgraph_protocol::Pointer;

/// Fetches an entity's subtree on first use.
///
/// The flag lives on each handle rather than on the cache: two handles on
/// the same entity load independently.
#[derive(Debug, Clone, Default)]
pub struct LazyLoader {
    initialized: bool,
}

impl LazyLoader {
    /// Creates a loader that has not fetched anything yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once a load has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Loads the subtree rooted at `root` unless this loader already did.
    ///
    /// A failed load leaves the loader uninitialized, so the next call
    /// tries again.
    pub fn ensure_loaded<T: RemoteTransport>(
        &mut self,
        engine: &Engine<T>,
        root: &Pointer,
    ) -> EngineResult<()> {
        if self.initialized {
            return Ok(());
        }
        engine.load_subtree(root)?;
        self.initialized = true;
        Ok(())
    }

    /// Forgets the load so the next call fetches again.
    pub fn reset(&mut self) {
        self.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::transport::MockTransport;
    use docgraph_protocol::Table;
    use std::time::Duration;

    fn engine() -> Engine<MockTransport> {
        Engine::new(
            EngineConfig::default().with_interval(Duration::ZERO),
            MockTransport::new(),
        )
    }

    #[test]
    fn loads_once() {
        let engine = engine();
        let root = Pointer::new(Table::Space, "s");
        let mut loader = LazyLoader::new();

        loader.ensure_loaded(&engine, &root).unwrap();
        loader.ensure_loaded(&engine, &root).unwrap();
        assert!(loader.is_initialized());
        assert_eq!(engine.transport().fetch_count(), 1);

        loader.reset();
        loader.ensure_loaded(&engine, &root).unwrap();
        assert_eq!(engine.transport().fetch_count(), 2);
    }

    #[test]
    fn failure_keeps_loader_uninitialized() {
        let engine = engine();
        let root = Pointer::new(Table::Space, "s");
        let mut loader = LazyLoader::new();

        engine.transport().fail_fetches(true);
        assert!(loader.ensure_loaded(&engine, &root).is_err());
        assert!(!loader.is_initialized());

        engine.transport().clear_failures();
        loader.ensure_loaded(&engine, &root).unwrap();
        assert!(loader.is_initialized());
    }

    #[test]
    fn handles_load_independently() {
        let engine = engine();
        let root = Pointer::new(Table::Space, "s");
        let mut first = LazyLoader::new();
        let mut second = LazyLoader::new();
        first.ensure_loaded(&engine, &root).unwrap();
        second.ensure_loaded(&engine, &root).unwrap();
        assert_eq!(engine.transport().fetch_count(), 2);
    }
}
