//! Claims data model.
//!
//! - [`Claim`] - one named, typed value
//! - [`ClaimCollection`] - the ordered set of claims making up a token
//! - [`ClaimFactory`] - builds typed claims and default claim values
//! - [`ClaimRegistry`] - the name → [`ClaimKind`] table the factory consults

pub mod claim;
pub mod collection;
pub mod factory;

pub use claim::{Claim, ClaimKind, IntoTimestamp, names};
pub use collection::ClaimCollection;
pub use factory::{ClaimFactory, ClaimRegistry, DEFAULT_TTL};
