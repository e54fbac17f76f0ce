use crate::config::AppConfig;
use crate::error::AppError;
use crate::state::AppState;

pub fn get_settings(state: &AppState) -> AppConfig {
    state.config()
}

pub fn get_setting(state: &AppState, key: &str) -> Result<String, AppError> {
    state.config().get(key)
}

pub fn set_setting(state: &AppState, key: &str, value: &str) -> Result<(), AppError> {
    state.update_config(|config| config.set(key, value))?;
    Ok(())
}
