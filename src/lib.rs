//! r-medialist library core functionality

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod download;
pub mod error;
pub mod playback;
pub mod store;
pub mod ui;

/// Initialize the application directories
pub fn init_app_dirs() -> std::io::Result<()> {
    let default_path = config::Settings::default_path();
    if let Some(config_dir) = default_path.parent() {
        if !config_dir.exists() {
            std::fs::create_dir_all(config_dir)?;
        }
    }
    Ok(())
}
