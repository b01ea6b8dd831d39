pub mod embed;
pub mod error;
pub mod mock;

pub use embed::Embedder;
pub use error::EmbedError;
pub use mock::MockEmbedder;
