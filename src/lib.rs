pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use commands::TrackerState;
pub use config::{open_store, BackendConfig, TrackerConfig};
pub use error::{FetchError, StoreError, WriteError};
pub use models::{Document, FieldValue, Fields, PracticedMap, PracticedRecord, Problem, UserId};
