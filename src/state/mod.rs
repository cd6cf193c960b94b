//! Session state and the runtime that drives it
//!
//! - `Session`: single reducer owning the recognition manager, the
//!   distortion controller and the timer generation
//! - `Runtime`: composition root executing the reducer's effects against
//!   the recognition backend, the camera and the display channel

mod runtime;
mod session;

pub use runtime::Runtime;
pub use session::SessionSnapshot;
