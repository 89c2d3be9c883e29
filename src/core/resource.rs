// JSON resource loading for profile definitions

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Failure to load a human-authored JSON resource.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("failed to read resource [{path}]")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse resource [{path}]")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Read and deserialize a JSON resource file.
pub fn load_json<T: DeserializeOwned>(path: &str) -> Result<T, ResourceError> {
    let data = std::fs::read_to_string(path).map_err(|source| ResourceError::Io {
        path: path.to_string(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| ResourceError::Parse {
        path: path.to_string(),
        source,
    })
}
