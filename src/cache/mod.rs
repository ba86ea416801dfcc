//! Client-side query cache.
//!
//! Reads are keyed by [`QueryKey`]; identical keys share one entry and one
//! in-flight request. Mutations never patch cached values; they invalidate
//! whole categories or exact keys once the server confirms the write.

pub mod key;
mod layer;
mod traits;

pub use key::{KeyFilter, QueryCategory, QueryKey};
pub use layer::{CacheLayer, ObserverGuard};
pub use traits::CacheResult;
