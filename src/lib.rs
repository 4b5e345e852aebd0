// Library surface for headless use and integration tests.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod config;
pub mod event;
pub mod playback;
pub mod runtime;
pub mod summary;
