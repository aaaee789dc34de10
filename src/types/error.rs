use thiserror::Error;

#[derive(Debug, Error)]
pub enum CostmapError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),
    #[error("cell out of bounds: {0}")]
    OutOfBounds(String),
    #[error("transform unavailable: {0}")]
    TransformUnavailable(String),
}
