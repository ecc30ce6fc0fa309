//! Web server for the key helper endpoint
//!
//! Runs alongside the reminder scheduler so the in-game helper can report
//! remaining keys for each member.

mod server;

pub use server::{router, start_web_server, AppState};
