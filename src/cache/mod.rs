pub mod query_cache;

pub use query_cache::{normalize_query, CachedQuery, QueryCache};
