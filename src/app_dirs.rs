use directories::ProjectDirs;
use std::path::PathBuf;

const APP_NAME: &str = "readalong";

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn project() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", APP_NAME)
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::project().map(|pd| pd.config_dir().join("config.json"))
    }

    pub fn log_path() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            let state_dir = PathBuf::from(home)
                .join(".local")
                .join("state")
                .join(APP_NAME);
            Some(state_dir.join("readalong.log"))
        } else {
            Self::project().map(|pd| pd.data_local_dir().join("readalong.log"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_app_scoped() {
        if let Some(path) = AppDirs::config_path() {
            assert!(path.ends_with("config.json"));
            assert!(path.to_string_lossy().contains(APP_NAME));
        }
        if let Some(path) = AppDirs::log_path() {
            assert!(path.ends_with("readalong.log"));
        }
    }
}
