//! IPC module for renderer and recognizer communication

mod protocol;
mod server;

pub use server::Server;
