use axum::{extract::State, http::StatusCode, Json};
use tracing::{info, warn};

use crate::config::set_music_root;
use crate::state::{AppState, JsonResult, SettingsPayload};
use crate::utils::json_error;

pub async fn get_settings(State(state): State<AppState>) -> JsonResult<SettingsPayload> {
    let music_root = state.config.read().music_root.clone();
    Ok(Json(SettingsPayload { music_root }))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Json(payload): Json<SettingsPayload>,
) -> JsonResult<SettingsPayload> {
    let music_root = payload.music_root.trim().to_string();
    if let Err(err) = set_music_root(&state.config_path, &state.config, &music_root) {
        warn!("Failed to save config: {}", err);
        return Err(json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("config error: {}", err),
        ));
    }
    info!("Music directory set to {:?}", music_root);
    Ok(Json(SettingsPayload { music_root }))
}
