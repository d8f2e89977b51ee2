use std::path::PathBuf;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::Json;
use common::MediaRecord;
use library::{ClusterStrategy, DuplicateGroup, Library, RedbCatalog, SkippedFile};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub config_path: PathBuf,
    pub config: Arc<RwLock<ServerConfig>>,
    pub library: Arc<Library<RedbCatalog>>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryResponse {
    pub file_list: Vec<MediaRecord>,
    pub inserted: usize,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicatesRequest {
    pub probability: f64,
    pub match_tags: bool,
    pub match_filename: bool,
    #[serde(default)]
    pub strategy: ClusterStrategy,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicatesResponse {
    pub duplicate_groups: Vec<DuplicateGroup>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPayload {
    pub music_root: String,
}

pub type JsonResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;
