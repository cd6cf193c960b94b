//! Manual input for fallback mode
//!
//! Key presses come from the terminal; clicks and the debug trigger arrive
//! over IPC from the renderer.

mod keys;
mod listener;

pub use keys::{key_matches, ManualTrigger};
pub use listener::KeyboardListener;
