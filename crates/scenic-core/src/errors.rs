use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("node not found: {0}")]
    NodeNotFound(String),
    #[error("parent not found: {0}")]
    ParentNotFound(String),
    #[error("parent is not a group: {0}")]
    ParentNotGroup(String),
    #[error("duplicate node id: {0}")]
    DuplicateId(String),
    #[error("the root node cannot be removed")]
    RootRemoval,
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
