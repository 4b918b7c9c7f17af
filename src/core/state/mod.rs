pub mod app_state;
pub mod paths;
pub mod settings;

pub use app_state::AppState;
pub use paths::{AppPaths, ProfilePaths};
pub use settings::LauncherSettings;
