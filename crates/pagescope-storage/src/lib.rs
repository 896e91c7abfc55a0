//! Blob offloading and the lookup cache.

pub mod blob;
pub mod cache;
pub mod error;
pub mod keys;
pub mod offload;
pub mod redis;
pub mod s3;

pub use blob::{BlobStore, LocalBlobStore, MemoryBlobStore, StoredBlob};
pub use cache::{LookupCache, MemoryLookupCache};
pub use error::StorageError;
pub use keys::{page_avatar_key, post_media_key, user_avatar_key, validate_key};
pub use offload::{BlobOffloader, MediaOffloader};
pub use redis::RedisLookupCache;
pub use s3::S3BlobStore;
