use rand::RngCore;
use std::path::{Component, Path};

use crate::error::{ImagerError, Result};

const RANDOM_NAME_BYTES: usize = 16;

/// Random hex name that keeps the original extension.
pub fn random_name(extension: Option<&str>) -> String {
    let mut bytes = [0u8; RANDOM_NAME_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let stem = hex::encode(bytes);

    match extension {
        Some(extension) if !extension.is_empty() => {
            format!("{}.{}", stem, extension.to_ascii_lowercase())
        }
        _ => stem,
    }
}

/// Guess the MIME type from a key's extension.
pub fn content_type(key: &str) -> &'static str {
    let extension = Path::new(key)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("bmp") => "image/bmp",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}

/// Reject names that would step out of a backend's root.
pub fn check_name(name: &str) -> Result<()> {
    let path = Path::new(name);
    let escapes = name.is_empty()
        || name.contains('\\')
        || path
            .components()
            .any(|component| !matches!(component, Component::Normal(_)));
    if escapes || path.components().count() != 1 {
        return Err(ImagerError::InvalidName(name.to_owned()));
    }
    Ok(())
}

/// Prefix a name with the configured upload directory.
pub fn object_key(upload_directory: Option<&str>, name: &str) -> String {
    match upload_directory.map(|directory| directory.trim_matches('/')) {
        Some(directory) if !directory.is_empty() => format!("{}/{}", directory, name),
        _ => name.to_owned(),
    }
}

/// Join a base URL and an object key with exactly one slash.
pub fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}

#[cfg(test)]
mod test {
    use super::{check_name, content_type, join_url, object_key, random_name};

    #[test]
    fn should_generate_distinct_random_names() {
        let first = random_name(Some("JPG"));
        let second = random_name(Some("jpg"));
        assert_ne!(first, second);
        assert!(first.ends_with(".jpg"));
        assert_eq!(first.len(), 32 + 4);
        assert_eq!(random_name(None).len(), 32);
    }

    #[test]
    fn should_guess_content_types() {
        assert_eq!(content_type("images/thumb_a.JPG"), "image/jpeg");
        assert_eq!(content_type("a.png"), "image/png");
        assert_eq!(content_type("README"), "application/octet-stream");
    }

    #[test]
    fn should_reject_escaping_names() {
        assert!(check_name("123.jpg").is_ok());
        assert!(check_name("").is_err());
        assert!(check_name("../etc/passwd").is_err());
        assert!(check_name("/etc/passwd").is_err());
        assert!(check_name("a/b.jpg").is_err());
        assert!(check_name("..").is_err());
        assert!(check_name("a\\b.jpg").is_err());
    }

    #[test]
    fn should_build_keys_and_urls() {
        assert_eq!(object_key(Some("/images/uploads/"), "a.jpg"), "images/uploads/a.jpg");
        assert_eq!(object_key(Some(""), "a.jpg"), "a.jpg");
        assert_eq!(object_key(None, "a.jpg"), "a.jpg");
        assert_eq!(
            join_url("https://cdn.example.com/", "/images/a.jpg"),
            "https://cdn.example.com/images/a.jpg"
        );
    }
}
