mod metrics;
mod passkey_models;
mod repository;

// Publicly expose the Metrics abstraction
pub use metrics::{Metrics, MetricsPtr};

// Publicly expose the persistence abstractions
pub use passkey_models::{PasskeyRecord, User};
pub use repository::{Repository, RepositoryPtr};
