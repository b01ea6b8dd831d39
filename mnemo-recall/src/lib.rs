pub mod bucket;
pub mod error;
pub mod index;
pub mod keys;
pub mod search;
pub mod segment;
pub mod types;

pub use bucket::{
    Bucket, all_buckets, bucket_1h, bucket_1d, bucket_1w, bucket_1m, bucket_3m,
    bucket_6m, bucket_1y, bucket_lt, bucket_for_span, compactable_buckets,
};
pub use error::RecallError;
pub use index::RecallIndex;
pub use types::{Query, ScoredSegment, SearchQuery, SearchResult, Segment};
