use std::env;
use std::path::PathBuf;

/// Service name reported by the info and health endpoints
pub const SERVICE_NAME: &str = "hellafresh-api";

/// Public API version
pub const API_VERSION: &str = "0.1.0";

/// Get the path to the HellaFresh data directory (~/.hellafresh)
pub fn hellafresh_dir() -> PathBuf {
    // First try HOME environment variable (useful for tests)
    if let Ok(home) = env::var("HOME") {
        PathBuf::from(home).join(".hellafresh")
    } else {
        dirs::home_dir()
            .unwrap_or_else(env::temp_dir)
            .join(".hellafresh")
    }
}

/// Get the path to the default SQLite database (~/.hellafresh/hellafresh.db)
pub fn database_file() -> PathBuf {
    hellafresh_dir().join("hellafresh.db")
}
