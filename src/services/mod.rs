pub mod cleanup;

pub use cleanup::CleanupService;
