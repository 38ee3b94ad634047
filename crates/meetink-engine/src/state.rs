//! The board's application state.

use std::cell::Cell;
use std::rc::Rc;

use kurbo::{Point, Size};
use meetink_core::camera::Camera;
use meetink_core::clock::ZIndexAllocator;
use meetink_core::config::EngineConfig;
use meetink_core::history::HistoryManager;
use meetink_core::input::InputState;
use meetink_core::scene::SceneGraph;
use meetink_core::selection::SelectionManager;
use meetink_core::spatial::SpatialIndex;
use meetink_core::store::ItemStore;
use meetink_core::tools::ToolManager;

/// Everything the board knows, passed by reference to the subsystems that need it.
///
/// The item store reports every mutation to an observer that raises `content_dirty`, so
/// local edits, remote events and undo/redo all end in the same re-render.
#[derive(Debug)]
pub struct BoardState {
    pub store: ItemStore,
    pub index: SpatialIndex,
    pub scene: SceneGraph,
    pub selection: SelectionManager,
    pub history: HistoryManager,
    pub camera: Camera,
    pub tools: ToolManager,
    pub input: InputState,
    pub z_alloc: ZIndexAllocator,
    /// Last pointer position in world space, for placement ghosts.
    pub pointer: Option<Point>,
    content_dirty: Rc<Cell<bool>>,
}

impl BoardState {
    pub fn new(config: &EngineConfig, viewport: Size) -> Self {
        let content_dirty = Rc::new(Cell::new(true));
        let mut store = ItemStore::new();
        let flag = content_dirty.clone();
        store.subscribe(move |change| {
            log::trace!("Store changed: {change:?}");
            flag.set(true);
        });
        Self {
            store,
            index: SpatialIndex::new(config.quadtree.clone()),
            scene: SceneGraph::new(viewport),
            selection: SelectionManager::new(),
            history: HistoryManager::new(config.history.limit),
            camera: Camera::new(),
            tools: ToolManager::new(),
            input: InputState::new(),
            z_alloc: ZIndexAllocator::new(),
            pointer: None,
            content_dirty,
        }
    }

    /// Force a full re-render on the next refresh, for changes the store cannot see.
    pub fn mark_content_dirty(&self) {
        self.content_dirty.set(true);
    }

    pub fn is_content_dirty(&self) -> bool {
        self.content_dirty.get()
    }

    /// Clear the dirty flag, returning whether it was set.
    pub(crate) fn take_content_dirty(&self) -> bool {
        self.content_dirty.replace(false)
    }

    pub fn zoom(&self) -> f64 {
        self.camera.zoom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meetink_core::items::{ImageData, Item, ItemData, Transform};

    #[test]
    fn test_store_mutations_mark_content_dirty() {
        let mut state = BoardState::new(&EngineConfig::default(), Size::new(100.0, 100.0));
        assert!(state.take_content_dirty());
        assert!(!state.is_content_dirty());

        state.store.upsert(Item::new(
            ItemData::Image(ImageData::new("a.png", 10.0, 10.0)),
            Transform::IDENTITY,
            1.0,
        ));
        assert!(state.take_content_dirty());
        assert!(!state.take_content_dirty());
    }
}
