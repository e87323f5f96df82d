pub mod object_store;

pub use object_store::{ObjectStore, Probe, S3ObjectStore, StorageError};
