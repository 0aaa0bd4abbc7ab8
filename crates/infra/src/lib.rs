//! Infrastructure layer: credential/token stores, revocation cache, the
//! token lifecycle manager, and the background purge job.

pub mod cache;
pub mod lifecycle;
pub mod purge;
pub mod store;

pub use cache::{InMemoryRevocationCache, RevocationCache};
pub use lifecycle::{TokenBundle, TokenLifecycle, TokenLifecycleConfig, VerifiedToken};
pub use purge::{purge_revoked, PurgeRunner};
pub use store::{
    InMemoryStore, RevokeOutcome, StoreError, TokenRecord, TokenStore, UserStore,
};
