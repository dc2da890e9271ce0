//! Path utilities for the console configuration file

use std::path::PathBuf;

/// Get the default configuration directory
///
/// Returns: `<config_dir>/radiola` (e.g. `~/.config/radiola` on Linux)
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("radiola")
}

/// Get the default config file path
///
/// Returns: `<config_dir>/radiola/config.yaml`
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_ends_with_radiola() {
        assert!(default_config_dir().ends_with("radiola"));
    }

    #[test]
    fn test_config_path_includes_filename() {
        assert!(default_config_path().ends_with("radiola/config.yaml"));
    }
}
