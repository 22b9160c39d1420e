//! Document uploads: policy checks, object storage, and the `/uploads` and `/files` routes.

pub mod asset;
pub mod gateway;
pub(crate) mod multipart;
pub mod policy;
pub mod router;
pub mod store;

#[cfg(test)]
mod tests;

pub use asset::{IncomingFile, StoredAssetRef, StoredObject};
pub use gateway::{AcceptedFile, UploadError, UploadGateway, MAX_FILES_PER_REQUEST};
pub use policy::UploadPolicy;
pub use router::upload_router;
pub use store::{FilesystemObjectStore, InMemoryObjectStore, ObjectStore, ObjectStoreError};
