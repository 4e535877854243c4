//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to load `{0}`")]
    Script(PathBuf, #[source] mlua::Error),

    #[error("`{0}` never called `config {{ ... }}`")]
    NotDeclared(PathBuf),

    #[error("Invalid config table in `{0}`")]
    Mapping(PathBuf, #[source] mlua::Error),

    #[error("Invalid timezone: {0}")]
    Timezone(String),

    #[error("Template `{name}` failed to compile")]
    Template {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("Config validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_config_error_display() {
        let io_err = ConfigError::Io(
            PathBuf::from("config.lua"),
            Error::new(ErrorKind::NotFound, "file not found"),
        );
        let display = format!("{io_err}");
        assert!(display.contains("IO error"));
        assert!(display.contains("config.lua"));

        let missing = ConfigError::NotDeclared(PathBuf::from("theme.lua"));
        assert_eq!(
            missing.to_string(),
            "`theme.lua` never called `config { ... }`"
        );

        let tz = ConfigError::Timezone("Mars/Olympus".into());
        assert!(tz.to_string().contains("Mars/Olympus"));
    }
}
