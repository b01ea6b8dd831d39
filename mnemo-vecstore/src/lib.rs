pub mod cosine;
pub mod error;
pub mod hnsw;
pub mod hnsw_io;
pub mod memory;
pub mod vecstore;

pub use cosine::cosine_distance;
pub use error::VecError;
pub use hnsw::{HNSW, HNSWConfig};
pub use hnsw_io::{load as load_hnsw, save as save_hnsw};
pub use memory::MemoryIndex;
pub use vecstore::{Match, VecIndex};
