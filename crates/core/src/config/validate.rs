use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Binary paths are not empty
/// - Pipe prefix is non-empty and a single path component
/// - Socket directory is absolute
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.binaries.ffmpeg.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "binaries.ffmpeg cannot be empty".to_string(),
        ));
    }
    if config.binaries.ffprobe.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "binaries.ffprobe cannot be empty".to_string(),
        ));
    }

    let prefix = &config.bridge.pipe_prefix;
    if prefix.is_empty() {
        return Err(ConfigError::ValidationError(
            "bridge.pipe_prefix cannot be empty".to_string(),
        ));
    }
    if prefix.contains(['/', '\\']) {
        return Err(ConfigError::ValidationError(format!(
            "bridge.pipe_prefix must not contain path separators: {}",
            prefix
        )));
    }

    if !config.bridge.socket_dir.is_absolute() {
        return Err(ConfigError::ValidationError(format!(
            "bridge.socket_dir must be absolute: {}",
            config.bridge.socket_dir.display()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_empty_ffmpeg_fails() {
        let mut config = Config::default();
        config.binaries.ffmpeg = PathBuf::new();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_prefix_with_separator_fails() {
        let mut config = Config::default();
        config.bridge.pipe_prefix = "../escape".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_relative_socket_dir_fails() {
        let mut config = Config::default();
        config.bridge.socket_dir = PathBuf::from("relative/dir");
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
