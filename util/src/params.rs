//! Generic parameters functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::{fs::read_to_string, io, path::Path};
use thiserror::Error;
use toml;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Cannot find the software root directory: {0}")]
    SwRootNotFound(io::Error),

    #[error("Cannot load the parmeter file: {0}")]
    FileLoadError(io::Error),

    #[error("Cannot read the parameter file: {0}")]
    DeserialiseError(toml::de::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LoadError {
    /// Returns true if the error was caused by the parameter file not existing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::FileLoadError(e) if e.kind() == io::ErrorKind::NotFound)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter file
///
/// The file path is relative to the `params` directory in the software root.
pub fn load<P>(param_file_path: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned,
{
    let mut path = crate::host::get_sw_root().map_err(LoadError::SwRootNotFound)?;
    path.push("params");
    path.push(param_file_path);

    load_path(path)
}

/// Load a parameter file from an explicit path.
pub fn load_path<P, F>(path: F) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    F: AsRef<Path>,
{
    let params_str = read_to_string(path).map_err(LoadError::FileLoadError)?;

    toml::from_str(params_str.as_str()).map_err(LoadError::DeserialiseError)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug, PartialEq)]
    struct TestParams {
        endpoint: String,
        home: [f64; 2],
    }

    #[test]
    fn test_load_path() {
        let path = std::env::temp_dir().join(format!("util_params_{}.toml", std::process::id()));
        std::fs::write(&path, "endpoint = \"tcp://localhost:5020\"\nhome = [1.5, -2.0]\n")
            .unwrap();

        let params: TestParams = load_path(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(
            params,
            TestParams {
                endpoint: "tcp://localhost:5020".into(),
                home: [1.5, -2.0],
            }
        );
    }

    #[test]
    fn test_missing_file() {
        let err = load_path::<TestParams, _>("/definitely/not/here.toml").unwrap_err();
        assert!(err.is_not_found());
    }
}
