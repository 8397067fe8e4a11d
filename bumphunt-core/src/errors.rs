use thiserror::Error;

#[derive(Error, Debug)]
pub enum BumpHuntError {
    #[error("Background spectrum has no bins")]
    EmptySpectrum,

    #[error("Malformed spectrum: {0}")]
    MalformedSpectrum(String),

    #[error("Background and observed spectra do not share the same binning: {0}")]
    BinningMismatch(String),

    #[error("Invalid search region: {0}")]
    InvalidSearchRegion(String),

    #[error("Invalid window size policy: {0}")]
    InvalidWindowPolicy(String),

    #[error("Invalid hunt configuration: {0}")]
    InvalidConfig(String),

    #[error("No channels to hunt in")]
    NoChannels,

    #[error("Channel index {0} out of range ({1} channels)")]
    ChannelOutOfRange(usize, usize),

    #[error("No search windows to scan: the search region is empty")]
    NoWindows,

    #[error("All bins are empty in the background spectrum")]
    AllBinsEmpty,

    #[error("Invalid sampling parameters: {0}")]
    Sampling(String),

    #[error("Unsupported config file type: {0}. It must be `toml`, `yaml` or `yml`")]
    UnsupportedConfigFile(String),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type BumpHuntResult<T> = std::result::Result<T, BumpHuntError>;

/// Coarse grouping of [BumpHuntError]s, used to tell bad settings apart from bad data.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum ErrorCategory {
    /// Settings or inputs that are inconsistent before any scan starts.
    Configuration,
    /// Inputs that are well formed but carry no usable information.
    DegenerateData,
    /// Distribution parameters rejected by the random samplers.
    Sampling,
    /// Reading or parsing files.
    Io,
}

impl BumpHuntError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BumpHuntError::EmptySpectrum
            | BumpHuntError::MalformedSpectrum(_)
            | BumpHuntError::BinningMismatch(_)
            | BumpHuntError::InvalidSearchRegion(_)
            | BumpHuntError::InvalidWindowPolicy(_)
            | BumpHuntError::InvalidConfig(_)
            | BumpHuntError::NoChannels
            | BumpHuntError::ChannelOutOfRange(..)
            | BumpHuntError::NoWindows
            | BumpHuntError::UnsupportedConfigFile(_)
            | BumpHuntError::ThreadPool(_) => ErrorCategory::Configuration,
            BumpHuntError::AllBinsEmpty => ErrorCategory::DegenerateData,
            BumpHuntError::Sampling(_) => ErrorCategory::Sampling,
            BumpHuntError::Io(_)
            | BumpHuntError::Json(_)
            | BumpHuntError::Toml(_)
            | BumpHuntError::Yaml(_) => ErrorCategory::Io,
        }
    }
}
