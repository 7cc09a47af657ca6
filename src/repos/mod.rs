pub mod error;
pub mod identity_store;
pub mod user_repo;

pub use identity_store::{Account, IdentityStore, InMemoryIdentityStore};
pub use user_repo::PgIdentityStore;
