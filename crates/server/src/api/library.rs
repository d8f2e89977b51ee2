use std::sync::Arc;

use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    Json,
};
use ::library::{DuplicateOptions, LibraryError, MatchPolicy};
use tokio::task::JoinError;
use tracing::info;

use crate::state::{
    AppState, DeleteResponse, DuplicatesRequest, DuplicatesResponse, ErrorResponse, JsonResult,
    LibraryResponse,
};
use crate::utils::{json_error, library_error};

pub async fn get_library(State(state): State<AppState>) -> JsonResult<LibraryResponse> {
    let library = Arc::clone(&state.library);
    let report = run_blocking(tokio::task::spawn_blocking(move || library.sync()).await)?;
    Ok(Json(LibraryResponse {
        file_list: report.records,
        inserted: report.inserted,
        skipped: report.skipped,
    }))
}

pub async fn delete_record(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> JsonResult<DeleteResponse> {
    let library = Arc::clone(&state.library);
    let record = run_blocking(tokio::task::spawn_blocking(move || library.delete(&id)).await)?;
    info!("Deleted {:?} via api", record.filepath);
    Ok(Json(DeleteResponse {
        success: true,
        message: "File deleted successfully".to_string(),
    }))
}

pub async fn find_duplicates(
    State(state): State<AppState>,
    Json(payload): Json<DuplicatesRequest>,
) -> JsonResult<DuplicatesResponse> {
    let options = duplicate_options(&payload)?;
    let library = Arc::clone(&state.library);
    let groups =
        run_blocking(tokio::task::spawn_blocking(move || library.find_duplicates(&options)).await)?;
    Ok(Json(DuplicatesResponse {
        duplicate_groups: groups,
    }))
}

pub(crate) fn duplicate_options(
    payload: &DuplicatesRequest,
) -> Result<DuplicateOptions, (StatusCode, Json<ErrorResponse>)> {
    if !(0.0..=1.0).contains(&payload.probability) {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "probability must be between 0 and 1",
        ));
    }
    let policy = MatchPolicy {
        match_tags: payload.match_tags,
        match_filename: payload.match_filename,
    };
    Ok(DuplicateOptions::new(payload.probability, policy).with_strategy(payload.strategy))
}

fn run_blocking<T>(
    joined: Result<Result<T, LibraryError>, JoinError>,
) -> Result<T, (StatusCode, Json<ErrorResponse>)> {
    match joined {
        Ok(result) => result.map_err(library_error),
        Err(err) => Err(json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("library task failed: {}", err),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::duplicate_options;
    use crate::state::DuplicatesRequest;
    use axum::http::StatusCode;
    use ::library::ClusterStrategy;

    fn request(probability: f64) -> DuplicatesRequest {
        DuplicatesRequest {
            probability,
            match_tags: true,
            match_filename: false,
            strategy: ClusterStrategy::Star,
        }
    }

    #[test]
    fn accepts_probability_bounds() {
        let options = duplicate_options(&request(0.0)).unwrap();
        assert_eq!(options.threshold, 0.0);
        assert!(options.policy.match_tags);
        assert!(duplicate_options(&request(1.0)).is_ok());
    }

    #[test]
    fn rejects_out_of_range_probability() {
        for value in [-0.1, 1.01, f64::NAN] {
            let (status, _) = duplicate_options(&request(value)).unwrap_err();
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn request_body_uses_camel_case() {
        let payload: DuplicatesRequest = serde_json::from_str(
            r#"{"probability":0.8,"matchTags":false,"matchFilename":true,"strategy":"connected"}"#,
        )
        .unwrap();
        assert!(payload.match_filename);
        assert_eq!(payload.strategy, ClusterStrategy::Connected);

        let payload: DuplicatesRequest =
            serde_json::from_str(r#"{"probability":0.5,"matchTags":true,"matchFilename":false}"#)
                .unwrap();
        assert_eq!(payload.strategy, ClusterStrategy::Star);
    }
}
