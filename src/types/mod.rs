//! Record types for functions, jobs, and job collections.
//!
//! These are the values the [`Store`](crate::store::Store) persists and the
//! service hands back to callers. All of them serialize to plain JSON.

pub mod collection;
pub mod function;
pub mod ids;
pub mod job;

pub use collection::*;
pub use function::*;
pub use ids::*;
pub use job::*;
