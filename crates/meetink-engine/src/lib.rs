//! Embeddable meetink whiteboard.
//!
//! A host creates a [`Whiteboard`] for a room, forwards pointer and keyboard events to it,
//! calls [`Whiteboard::tick`] every frame and presents the compositor's frame. Image bytes
//! are fetched by the host on request ([`Whiteboard::take_texture_requests`]) and handed
//! back through [`Whiteboard::complete_texture_load`].

mod commands;
pub mod shortcuts;
pub mod state;
pub mod whiteboard;

pub use meetink_core as core;
pub use meetink_render as render;

pub use shortcuts::{Command, Shortcut, ShortcutRegistry};
pub use state::BoardState;
pub use whiteboard::Whiteboard;

/// Initialize logging from `RUST_LOG` for native hosts. Safe to call more than once.
#[cfg(feature = "native")]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();
}
