//! Server build manifest.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot read {path}: {source}")]
    Missing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Output of the client build that the document shell links to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerBuild {
    /// Build version, surfaced as `X-App-Version` in production.
    pub version: String,

    /// Client entry module URL.
    pub entry: String,

    /// Stylesheet URLs.
    #[serde(default)]
    pub stylesheets: Vec<String>,
}

impl ServerBuild {
    /// Read the manifest. Called per request so a rebuilt or repaired
    /// build is picked up without a restart.
    pub async fn load(path: &Path) -> Result<Self, BuildError> {
        let raw = tokio::fs::read(path).await.map_err(|source| BuildError::Missing {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&raw).map_err(|source| BuildError::Invalid {
            path: path.to_path_buf(),
            source,
        })
    }
}
