//! Distortion of the mirror feed
//!
//! Claims raise a bounded level (0..=max), each level selecting a worse
//! visual tier. The top level leads to the verdict. An ambient noise
//! animation runs on every frame once the mirror is distorted.

mod controller;
mod glitch;
mod tier;

pub use controller::DistortionController;
#[cfg(test)]
pub use controller::humanity_for;
