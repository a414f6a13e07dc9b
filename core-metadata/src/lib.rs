//! Metadata services for the curation core: provider adapters' capability
//! trait, the lookup cache, the reconciler that folds candidate records
//! into one canonical record per group, the change-set computer, and the
//! tag writer with its lofty-backed codec.

pub mod cache;
pub mod changeset;
pub mod error;
pub mod genres;
pub mod lofty_codec;
pub mod provider;
pub mod reconciler;
pub mod writer;

pub use cache::{CacheOutcome, MetadataCache};
pub use changeset::compute_changes;
pub use error::{MetadataError, Result};
pub use lofty_codec::LoftyTagCodec;
pub use provider::{MetadataProvider, ProviderQuery, ProviderRecord, ProviderSource};
pub use reconciler::{MergePolicy, ReconcileOutcome, Reconciler};
pub use writer::{FileWriteResult, TagWriter, WriteOutcome};
