pub mod compact;
pub mod conversation;
pub mod error;
pub mod host;
pub mod infer;
pub mod keys;
pub mod memory;
pub mod types;

pub use error::MemoryError;
pub use host::{Host, HostConfig};
pub use infer::InferConfig;
pub use memory::Memory;
pub use conversation::Conversation;
pub use types::{
    CompressPolicy, CompressResult, Compressor, EntityInfo, EntityInput,
    EntityUpdate, Message, RecallQuery, RecallResult, RelationInput, Role,
    ScoredSegment, SegmentInput, now_nano,
};

#[cfg(test)]
mod tests;
