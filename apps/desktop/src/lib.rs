pub mod local_backend;
pub mod script;

pub use local_backend::{LocalBackend, LocalBackendConfig};
pub use script::run_tutorial;
