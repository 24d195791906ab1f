//! Route handlers

use super::SharedState;
use crate::constants::{APP_VERSION, CACHE_MAX_AGE, IMAGE_EXTENSIONS};
use crate::error::{AppError, AppResult};
use crate::store::Record;
use crate::types::{ApiResponse, ImageTarget, ServerStatus};
use crate::utils::{mime_for_path, sanitize_filename, save_image_file};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::{info, warn};

type JsonResponse = AppResult<Json<ApiResponse>>;

/// Request bodies are parsed leniently: empty or invalid JSON is `{}`
fn parse_body(body: &[u8]) -> Record {
    if body.is_empty() {
        return Record::new();
    }
    match serde_json::from_slice(body) {
        Ok(Value::Object(map)) => map,
        Ok(_) => Record::new(),
        Err(e) => {
            warn!(error = %e, "Ignoring malformed request body");
            Record::new()
        }
    }
}

fn parse_id(raw: &str) -> AppResult<i64> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("invalid id: {}", raw)))
}

fn file_dir(state: &SharedState, kind: &str, allow_creative: bool) -> AppResult<PathBuf> {
    let paths = state.paths();
    match kind {
        "output" => Ok(paths.output.clone()),
        "input" => Ok(paths.input.clone()),
        "creative" if allow_creative => Ok(paths.creative_images.clone()),
        _ => Err(AppError::NotFound("unknown route".into())),
    }
}

fn file_path(dir: PathBuf, name: &str) -> AppResult<PathBuf> {
    match sanitize_filename(name) {
        Some(clean) if clean == name => Ok(dir.join(clean)),
        _ => Err(AppError::NotFound("file not found".into())),
    }
}

// ============================================================================
// FILES
// ============================================================================

pub async fn serve_file(
    State(state): State<SharedState>,
    Path((kind, name)): Path<(String, String)>,
) -> AppResult<Response> {
    let path = file_path(file_dir(&state, &kind, true)?, &name)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| AppError::NotFound("file not found".into()))?;

    Ok((
        [
            (header::CONTENT_TYPE, mime_for_path(&path)),
            (header::CACHE_CONTROL, CACHE_MAX_AGE),
        ],
        bytes,
    )
        .into_response())
}

pub async fn status(State(state): State<SharedState>) -> JsonResponse {
    let paths = state.paths();
    let status = ServerStatus {
        status: "running".into(),
        version: APP_VERSION.into(),
        mode: "local".into(),
        input_dir: paths.input.display().to_string(),
        output_dir: paths.output.display().to_string(),
    };
    Ok(Json(ApiResponse::ok(serde_json::to_value(status)?)))
}

async fn save_image(state: &SharedState, target: ImageTarget, body: &[u8]) -> JsonResponse {
    let body = parse_body(body);
    let image_data = body
        .get("imageData")
        .and_then(Value::as_str)
        .filter(|data| !data.is_empty())
        .ok_or_else(|| AppError::BadRequest("missing image data".into()))?;
    let filename = body.get("filename").and_then(Value::as_str);

    let paths = state.paths();
    let dir = match target {
        ImageTarget::Input => &paths.input,
        ImageTarget::Output => &paths.output,
        ImageTarget::Desktop => &paths.desktop,
    };

    match save_image_file(image_data, filename, target, dir) {
        Ok(saved) => {
            info!(file = %saved.filename, target = ?target, "Image saved");
            let mut response = ApiResponse::ok(serde_json::to_value(saved)?);
            if target == ImageTarget::Desktop {
                response = response.with_extra("desktop_path", paths.desktop.display().to_string());
            }
            Ok(Json(response))
        }
        Err(e) => {
            warn!(error = %e, target = ?target, "Failed to save image");
            Ok(Json(ApiResponse::failure(e)))
        }
    }
}

pub async fn save_output(State(state): State<SharedState>, body: Bytes) -> JsonResponse {
    save_image(&state, ImageTarget::Output, &body).await
}

pub async fn save_input(State(state): State<SharedState>, body: Bytes) -> JsonResponse {
    save_image(&state, ImageTarget::Input, &body).await
}

pub async fn save_desktop(State(state): State<SharedState>, body: Bytes) -> JsonResponse {
    save_image(&state, ImageTarget::Desktop, &body).await
}

pub async fn list_files(
    State(state): State<SharedState>,
    Path(kind): Path<String>,
) -> JsonResponse {
    let dir = file_dir(&state, &kind, false)?;
    let files = crate::utils::list_files(&dir, IMAGE_EXTENSIONS);
    Ok(Json(ApiResponse::ok(serde_json::to_value(files)?)))
}

pub async fn delete_file(
    State(state): State<SharedState>,
    Path((kind, name)): Path<(String, String)>,
) -> JsonResponse {
    let path = file_path(file_dir(&state, &kind, false)?, &name)?;
    if !path.is_file() {
        return Err(AppError::NotFound("file not found".into()));
    }
    tokio::fs::remove_file(&path).await?;
    info!(path = %path.display(), "File deleted");
    Ok(Json(ApiResponse::ok_message("file deleted")))
}

// ============================================================================
// CREATIVE IDEAS
// ============================================================================

pub async fn list_ideas(State(state): State<SharedState>) -> JsonResponse {
    let _guard = state.data_lock.read().await;
    Ok(Json(ApiResponse::ok(json!(state.store.ideas()))))
}

pub async fn get_idea(State(state): State<SharedState>, Path(id): Path<String>) -> JsonResponse {
    let id = parse_id(&id)?;
    let _guard = state.data_lock.read().await;
    state
        .store
        .idea(id)
        .map(|idea| Json(ApiResponse::ok(Value::Object(idea))))
        .ok_or_else(|| AppError::NotFound("idea not found".into()))
}

pub async fn create_idea(State(state): State<SharedState>, body: Bytes) -> JsonResponse {
    let _guard = state.data_lock.write().await;
    let idea = state.store.create_idea(parse_body(&body))?;
    Ok(Json(ApiResponse::ok(Value::Object(idea))))
}

pub async fn import_ideas(State(state): State<SharedState>, body: Bytes) -> JsonResponse {
    let incoming: Vec<Record> = match parse_body(&body).remove("ideas") {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    let _guard = state.data_lock.write().await;
    let outcome = state.store.import_ideas(incoming)?;
    let mut response = ApiResponse::ok(json!(outcome.imported))
        .with_extra("imported", outcome.imported.len())
        .with_extra("skipped", outcome.skipped);
    response.message = Some(outcome.message());
    Ok(Json(response))
}

pub async fn reorder_ideas(State(state): State<SharedState>, body: Bytes) -> JsonResponse {
    let ordered_ids: Vec<i64> = parse_body(&body)
        .get("orderedIds")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default();

    let _guard = state.data_lock.write().await;
    state.store.reorder_ideas(&ordered_ids)?;
    Ok(Json(ApiResponse::ok_message("order updated")))
}

pub async fn update_idea(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    body: Bytes,
) -> JsonResponse {
    let id = parse_id(&id)?;
    let _guard = state.data_lock.write().await;
    state
        .store
        .update_idea(id, parse_body(&body))?
        .map(|idea| Json(ApiResponse::ok(Value::Object(idea))))
        .ok_or_else(|| AppError::NotFound("idea not found".into()))
}

pub async fn delete_idea(State(state): State<SharedState>, Path(id): Path<String>) -> JsonResponse {
    let id = parse_id(&id)?;
    let _guard = state.data_lock.write().await;
    if state.store.delete_idea(id)? {
        Ok(Json(ApiResponse::ok_message("deleted")))
    } else {
        Err(AppError::NotFound("idea not found".into()))
    }
}

// ============================================================================
// HISTORY
// ============================================================================

pub async fn list_history(State(state): State<SharedState>) -> JsonResponse {
    let _guard = state.data_lock.read().await;
    Ok(Json(ApiResponse::ok(json!(state.store.history()))))
}

pub async fn add_history(State(state): State<SharedState>, body: Bytes) -> JsonResponse {
    let _guard = state.data_lock.write().await;
    let record = state.store.add_history(parse_body(&body))?;
    Ok(Json(ApiResponse::ok(Value::Object(record))))
}

pub async fn delete_history(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> JsonResponse {
    let id = parse_id(&id)?;
    let _guard = state.data_lock.write().await;
    if state.store.delete_history(id)? {
        Ok(Json(ApiResponse::ok_message("deleted")))
    } else {
        Err(AppError::NotFound("record not found".into()))
    }
}

pub async fn clear_history(State(state): State<SharedState>) -> JsonResponse {
    let _guard = state.data_lock.write().await;
    state.store.clear_history()?;
    Ok(Json(ApiResponse::ok_message("history cleared")))
}

// ============================================================================
// SETTINGS & DESKTOP
// ============================================================================

pub async fn get_settings(State(state): State<SharedState>) -> JsonResponse {
    let _guard = state.data_lock.read().await;
    Ok(Json(ApiResponse::ok(state.store.settings())))
}

pub async fn save_settings(State(state): State<SharedState>, body: Bytes) -> JsonResponse {
    let settings = Value::Object(parse_body(&body));
    let _guard = state.data_lock.write().await;
    state.store.save_settings(&settings)?;
    Ok(Json(ApiResponse::ok(settings)))
}

pub async fn get_desktop(State(state): State<SharedState>) -> JsonResponse {
    let _guard = state.data_lock.read().await;
    Ok(Json(ApiResponse::ok(state.store.desktop_items())))
}

pub async fn save_desktop_items(State(state): State<SharedState>, body: Bytes) -> JsonResponse {
    let items = parse_body(&body)
        .remove("items")
        .unwrap_or_else(|| json!([]));
    let _guard = state.data_lock.write().await;
    state.store.save_desktop_items(&items)?;
    Ok(Json(ApiResponse::ok_message("desktop saved")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_body_parsing() {
        assert!(parse_body(b"").is_empty());
        assert!(parse_body(b"{oops").is_empty());
        assert!(parse_body(b"[1,2]").is_empty());
        assert_eq!(parse_body(br#"{"a":1}"#)["a"], json!(1));
    }

    #[test]
    fn ids_must_be_integers() {
        assert_eq!(parse_id("12").unwrap(), 12);
        assert!(matches!(parse_id("x"), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn file_paths_reject_traversal() {
        let dir = PathBuf::from("/base");
        assert_eq!(file_path(dir.clone(), "a.png").unwrap(), PathBuf::from("/base/a.png"));
        assert!(file_path(dir.clone(), "..").is_err());
        assert!(file_path(dir, "../a.png").is_err());
    }
}
