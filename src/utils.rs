//! Utility functions

use crate::types::{FileEntry, ImageTarget, SavedFile};
use base64::Engine;
use serde_json::{Map, Value};
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Split a `data:<mime>;base64,<payload>` URL into header and payload
pub fn split_data_url(url: &str) -> Option<(&str, &str)> {
    if !url.starts_with("data:") {
        return None;
    }
    url.split_once(',')
}

/// Pick a file extension from a data URL header, `.png` when unknown
pub fn extension_for_header(header: &str) -> &'static str {
    let header = header.to_ascii_lowercase();
    if header.contains("jpeg") || header.contains("jpg") {
        ".jpg"
    } else if header.contains("png") {
        ".png"
    } else if header.contains("webp") {
        ".webp"
    } else if header.contains("gif") {
        ".gif"
    } else {
        ".png"
    }
}

/// Decode a raw base64 string or a base64 data URL
pub fn decode_image_data(image_data: &str) -> Result<Vec<u8>, String> {
    let payload = split_data_url(image_data).map_or(image_data, |(_, data)| data);
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| e.to_string())
}

/// Encode bytes as a base64 data URL with the given MIME type
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Short lowercase hex id taken from a fresh v4 UUID
pub fn short_id(len: usize) -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    hex[..len.min(hex.len())].to_string()
}

/// Generated name for an image saved without an explicit filename
pub fn generated_image_name(image_data: &str) -> String {
    let ext = split_data_url(image_data).map_or(".png", |(header, _)| extension_for_header(header));
    format!(
        "penguin_{}_{}{}",
        chrono::Local::now().format("%Y%m%d_%H%M%S"),
        short_id(8),
        ext
    )
}

/// Reduce a caller supplied filename to a bare file name inside the target dir
pub fn sanitize_filename(name: &str) -> Option<String> {
    let name = Path::new(name).file_name()?.to_str()?;
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

/// Decode `image_data` and write it into `dir`.
pub fn save_image_file(
    image_data: &str,
    filename: Option<&str>,
    target: ImageTarget,
    dir: &Path,
) -> Result<SavedFile, String> {
    let filename = match filename.filter(|f| !f.is_empty()) {
        Some(name) => sanitize_filename(name).ok_or_else(|| format!("invalid filename: {}", name))?,
        None => generated_image_name(image_data),
    };

    let bytes = decode_image_data(image_data)?;
    std::fs::create_dir_all(dir).map_err(|e| e.to_string())?;
    let path = dir.join(&filename);
    std::fs::write(&path, &bytes).map_err(|e| e.to_string())?;

    Ok(SavedFile {
        url: target.url_prefix().map(|prefix| format!("{}/{}", prefix, filename)),
        path: path.display().to_string(),
        filename,
    })
}

fn epoch_secs(time: std::io::Result<std::time::SystemTime>) -> Option<f64> {
    time.ok()?
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs_f64())
}

/// List files in `dir` whose names end with one of `extensions`
/// (case-insensitive), most recently modified first.
pub fn list_files(dir: &Path, extensions: &[&str]) -> Vec<FileEntry> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<FileEntry> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            if !meta.is_file() {
                return None;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let lower = name.to_lowercase();
            if !extensions.iter().any(|ext| lower.ends_with(ext)) {
                return None;
            }
            let modified = epoch_secs(meta.modified()).unwrap_or_default();
            Some(FileEntry {
                name,
                size: meta.len(),
                created: epoch_secs(meta.created()).unwrap_or(modified),
                modified,
            })
        })
        .collect();

    files.sort_by(|a, b| b.modified.total_cmp(&a.modified));
    files
}

/// Move a base64 `imageUrl` of a creative idea into `dir` and point the
/// idea at the served copy. Returns the number of bytes written, or `None`
/// when the idea has no inline image.
pub fn externalize_creative_image(
    idea: &mut Map<String, Value>,
    dir: &Path,
) -> Result<Option<usize>, String> {
    let Some(image_url) = idea.get("imageUrl").and_then(Value::as_str) else {
        return Ok(None);
    };
    if image_url.is_empty() || image_url.starts_with("/files/") {
        return Ok(None);
    }
    let Some((header, _)) = split_data_url(image_url) else {
        return Ok(None);
    };

    let filename = format!("creative_{}{}", short_id(12), extension_for_header(header));
    let bytes = decode_image_data(image_url)?;
    std::fs::create_dir_all(dir).map_err(|e| e.to_string())?;
    std::fs::write(dir.join(&filename), &bytes).map_err(|e| e.to_string())?;

    idea.insert(
        "imageUrl".to_string(),
        Value::String(format!("/files/creative/{}", filename)),
    );
    Ok(Some(bytes.len()))
}

/// MIME type served for a file, from its extension
pub fn mime_for_path(path: &Path) -> &'static str {
    image::ImageFormat::from_path(path)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

/// Local time in ISO-8601 without offset, e.g. `2024-05-01T12:30:00.123456`
pub fn now_iso() -> String {
    chrono::Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Format bytes into human-readable string (B, KB, MB)
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PIXEL: &[u8] = b"\x89PNG\r\n\x1a\nfake";

    #[test]
    fn extension_follows_header() {
        assert_eq!(extension_for_header("data:image/jpeg;base64"), ".jpg");
        assert_eq!(extension_for_header("data:image/webp;base64"), ".webp");
        assert_eq!(extension_for_header("data:image/gif;base64"), ".gif");
        assert_eq!(extension_for_header("data:application/x;base64"), ".png");
    }

    #[test]
    fn decodes_plain_and_data_url() {
        let url = encode_data_url("image/png", PIXEL);
        assert_eq!(decode_image_data(&url).unwrap(), PIXEL);
        let (_, raw) = split_data_url(&url).unwrap();
        assert_eq!(decode_image_data(raw).unwrap(), PIXEL);
        assert!(decode_image_data("***").is_err());
    }

    #[test]
    fn generated_names_use_header_extension() {
        let name = generated_image_name(&encode_data_url("image/jpeg", PIXEL));
        assert!(name.starts_with("penguin_"));
        assert!(name.ends_with(".jpg"));
        // penguin_ + YYYYmmdd_HHMMSS + _ + 8 hex + .jpg
        assert_eq!(name.len(), "penguin_".len() + 15 + 1 + 8 + 4);
        assert!(generated_image_name("AAAA").ends_with(".png"));
    }

    #[test]
    fn save_strips_directories_from_filename() {
        let dir = tempfile::tempdir().unwrap();
        let url = encode_data_url("image/png", PIXEL);
        let saved =
            save_image_file(&url, Some("../../evil.png"), ImageTarget::Input, dir.path()).unwrap();
        assert_eq!(saved.filename, "evil.png");
        assert_eq!(saved.url.as_deref(), Some("/files/input/evil.png"));
        assert_eq!(std::fs::read(dir.path().join("evil.png")).unwrap(), PIXEL);
    }

    #[test]
    fn save_rejects_bad_payload() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_image_file("not base64!", Some("x.png"), ImageTarget::Output, dir.path());
        assert!(err.is_err());
        assert!(!dir.path().join("x.png").exists());
    }

    #[test]
    fn list_filters_extensions_and_orders_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old.PNG"), b"a").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"b").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        std::fs::write(dir.path().join("new.webp"), b"cc").unwrap();
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        let files = list_files(dir.path(), crate::constants::IMAGE_EXTENSIONS);
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["new.webp", "old.PNG"]);
        assert_eq!(files[0].size, 2);
    }

    #[test]
    fn list_missing_dir_is_empty() {
        assert!(list_files(Path::new("/definitely/not/here"), &[".png"]).is_empty());
    }

    #[test]
    fn externalize_rewrites_data_urls_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut idea = json!({ "title": "t", "imageUrl": encode_data_url("image/gif", PIXEL) })
            .as_object()
            .cloned()
            .unwrap();
        let written = externalize_creative_image(&mut idea, dir.path()).unwrap();
        assert_eq!(written, Some(PIXEL.len()));
        let url = idea["imageUrl"].as_str().unwrap().to_string();
        assert!(url.starts_with("/files/creative/creative_"));
        assert!(url.ends_with(".gif"));

        // already local: untouched
        assert_eq!(externalize_creative_image(&mut idea, dir.path()).unwrap(), None);
        assert_eq!(idea["imageUrl"], json!(url));
    }

    #[test]
    fn mime_types() {
        assert_eq!(mime_for_path(Path::new("a.png")), "image/png");
        assert_eq!(mime_for_path(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("a.webp")), "image/webp");
        assert_eq!(mime_for_path(Path::new("a.gif")), "image/gif");
        assert_eq!(mime_for_path(Path::new("a.bin")), "application/octet-stream");
        assert_eq!(mime_for_path(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn formats_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
    }
}
