//! Business rules, independent of HTTP. Every function takes the store (any
//! type implementing the `db` traits), the calling actor, and the clock
//! reading it should use.

mod error;
pub use error::ServiceError;

pub mod identity;
pub mod lifecycle;
pub mod listing;
pub mod stats;
pub mod users;

#[cfg(test)]
pub(crate) mod test_support;
