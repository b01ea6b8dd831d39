pub mod error;
pub mod graph;
pub mod kvgraph;

pub use error::GraphError;
pub use graph::{Entity, Graph, Relation};
pub use kvgraph::{DEFAULT_SEPARATOR, KVGraph};
