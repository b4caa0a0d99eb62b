/*
[INPUT]:  API client responses
[OUTPUT]: Cached queries, cursor pagers and cache invalidation after mutations
[POS]:    Query layer - data hooks consumed by views and the CLI
[UPDATE]: When adding queries or changing staleness rules
*/

pub mod cache;
pub mod feed;
pub mod paginator;

pub use cache::{DEFAULT_STALE_TIME, QueryCache};
pub use feed::FeedQueries;
pub use paginator::{PageFetcher, Paginator};
