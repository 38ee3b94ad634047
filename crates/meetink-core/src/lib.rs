//! meetink core library
//!
//! Platform-agnostic data model, geometry, input processing and collaboration protocol for
//! the meetink whiteboard. Nothing here draws pixels; rendering lives in `meetink-render`.

pub mod camera;
pub mod clock;
pub mod collaboration;
pub mod config;
pub mod error;
pub mod geometry;
pub mod history;
pub mod input;
pub mod interaction;
pub mod items;
pub mod scene;
pub mod selection;
pub mod spatial;
pub mod store;
pub mod stroke;
pub mod sync;
pub mod text_layout;
pub mod tools;

pub use camera::Camera;
pub use clock::{ZIndexAllocator, now_ms};
pub use collaboration::{LiveStroke, RemoteCursor, SyncController, SyncReport};
pub use config::{EngineConfig, SelectionConfig, StrokeConfig, SyncConfig};
pub use error::{BoardError, BoardResult};
pub use geometry::{GroupBounds, Obb};
pub use history::{HistoryManager, Reconciliation};
pub use input::{InputState, Key, Modifiers, PointerButton, PointerEvent};
pub use interaction::{InteractionController, InteractionState, PressOutcome};
pub use items::{Item, ItemData, ItemId, ItemKind, ItemPatch, SerializableColor, Transform};
pub use scene::{Layer, LayerKind, SceneGraph, SceneNode};
pub use selection::{HandleKind, SelectionManager};
pub use spatial::SpatialIndex;
pub use store::{ItemStore, StoreChange};
pub use stroke::{StrokeInput, StrokeOutcome};
pub use sync::{BoardEvent, ConnectionState, Envelope, MemoryHub, OfflineTransport, Transport};
pub use tools::{ToolKind, ToolManager};
