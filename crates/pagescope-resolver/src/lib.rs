//! Profile resolution: cache-aside lookup over the profile store, with live
//! acquisition on a miss.

pub mod acquire;
pub mod error;
pub mod refresh;
pub mod resolver;
pub mod setup;
pub mod singleflight;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use acquire::{AcquireSettings, AcquisitionEngine, AcquisitionReport};
pub use error::{AcquisitionFailure, ChildExtractionFailure, ResolveError, StepError};
pub use refresh::{refresh_all, RefreshOutcome};
pub use resolver::{cache_key, Resolver};
pub use setup::{build_blob_store, build_cache, build_resolver, SetupError};
pub use singleflight::SingleFlight;
pub use store::{PgProfileStore, ProfileStore};
