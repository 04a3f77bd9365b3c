// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod db;
pub mod gateway;
pub mod memory;
pub mod notice;
pub mod reaction;
pub mod runtime;
pub mod session;
pub mod ui;
pub mod util;
