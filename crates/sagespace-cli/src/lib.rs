/*
[INPUT]:  Public API exports for the sagespace-cli crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod app;
pub mod config;

// Re-export main types for convenience
pub use app::App;
pub use config::AppConfig;
