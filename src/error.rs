#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Config directory not found")]
    NoConfigDir,

    #[error("Player not found: {0}")]
    PlayerNotFound(String),

    #[error("Failed to launch player: {0}")]
    PlayerLaunch(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Catalog request failed: {0}")]
    Catalog(String),

    #[error("Analysis request failed: {0}")]
    Analysis(String),
}

pub type Result<T> = std::result::Result<T, Error>;
