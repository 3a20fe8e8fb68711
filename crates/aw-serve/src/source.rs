//! Where a serving process finds its artifacts.

use std::fmt;
use std::path::PathBuf;

pub const ENV_MODEL_DIR: &str = "MODEL_DIR";
pub const ENV_MODEL_URL: &str = "MODEL_URL";
pub const DEFAULT_MODEL_DIR: &str = "models";

/// A local artifact directory or a remote base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    Local(PathBuf),
    Remote(String),
}

impl ArtifactSource {
    /// `http://` and `https://` locations are remote, anything else is a path.
    pub fn parse(location: &str) -> Self {
        let location = location.trim();
        if location.starts_with("http://") || location.starts_with("https://") {
            ArtifactSource::Remote(location.trim_end_matches('/').to_string())
        } else {
            ArtifactSource::Local(PathBuf::from(location))
        }
    }

    /// `MODEL_DIR` wins over `MODEL_URL`; without either the local
    /// `models` directory is used. Blank values count as unset.
    pub fn from_env<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        set(ENV_MODEL_DIR)
            .or_else(|| set(ENV_MODEL_URL))
            .map(|v| Self::parse(&v))
            .unwrap_or_else(|| ArtifactSource::Local(PathBuf::from(DEFAULT_MODEL_DIR)))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ArtifactSource::Remote(_))
    }
}

impl fmt::Display for ArtifactSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactSource::Local(path) => write!(f, "{}", path.display()),
            ArtifactSource::Remote(url) => write!(f, "{url}"),
        }
    }
}
