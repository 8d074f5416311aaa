//! Storage adapter boundary: signed URLs and object transfer.
//!
//! - [`router`] - The `StorageRouter` / `ObjectTransfer` traits and
//!   signed-URL request types
//! - [`transfer`] - HTTP transfer through signed URLs
//! - [`memory`] - In-memory double implementing both traits for tests

pub mod memory;
pub mod router;
pub mod transfer;

pub use memory::{MemoryStorage, StoredObject};
pub use router::{
    DownloadUrlRequest, ObjectTransfer, SignedUrl, StorageRouter, UploadUrlRequest,
    TRANSFER_URL_EXPIRY,
};
pub use transfer::HttpTransfer;
