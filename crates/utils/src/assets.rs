use std::path::PathBuf;

use directories::ProjectDirs;

/// Directory holding the local database. Falls back to the working directory
/// when the platform exposes no data dir.
pub fn data_dir() -> PathBuf {
    ProjectDirs::from("app", "wardrobe", "wardrobe")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn default_database_url() -> String {
    format!("sqlite://{}", data_dir().join("wardrobe.db").display())
}
