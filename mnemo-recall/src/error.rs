use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecallError {
    #[error("recall: storage error: {0}")]
    Storage(String),

    #[error("recall: graph error: {0}")]
    Graph(String),

    #[error("recall: vector error: {0}")]
    Vector(String),

    #[error("recall: embed error: {0}")]
    Embed(String),

    #[error("recall: serialization error: {0}")]
    Serialization(String),
}

impl From<mnemo_kv::KVError> for RecallError {
    fn from(e: mnemo_kv::KVError) -> Self {
        RecallError::Storage(e.to_string())
    }
}

impl From<mnemo_graph::GraphError> for RecallError {
    fn from(e: mnemo_graph::GraphError) -> Self {
        RecallError::Graph(e.to_string())
    }
}

impl From<mnemo_vecstore::VecError> for RecallError {
    fn from(e: mnemo_vecstore::VecError) -> Self {
        RecallError::Vector(e.to_string())
    }
}

impl From<mnemo_embed::EmbedError> for RecallError {
    fn from(e: mnemo_embed::EmbedError) -> Self {
        RecallError::Embed(e.to_string())
    }
}
