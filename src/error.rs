use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeGpError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Invalid tree: {0}")]
    InvalidTree(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TreeGpError>;
