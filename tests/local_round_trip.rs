use imager::{Imager, ImagerError, SourceAsset};
use serde_json::json;
use std::path::Path;

fn imager(root: &Path) -> Imager {
    let config = json!({
        "variants": {
            "items": {
                "resize": { "mini": "300x200" },
                "crop": { "thumb": "200x200" },
                "keep_names": true
            },
            "avatars": { "crop": { "small": "64x64" } }
        },
        "storage": {
            "Local": {
                "kind": "local",
                "path": root,
                "public_url": "http://localhost:8080/media"
            }
        },
        "upload_directory": "images",
        "default_variant": "avatars"
    });
    Imager::from_value(&config, ["Local", "S3"]).unwrap()
}

#[tokio::test]
async fn should_upload_and_remove_through_local_storage() {
    let fixtures = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let photo = fixtures.path().join("photo.jpg");
    std::fs::write(&photo, b"jpeg bytes").unwrap();

    let imager = imager(root.path());
    assert_eq!(imager.backends().len(), 1);

    let report = imager.upload(vec![photo.clone()], Some("items")).await.unwrap();
    let (primary_uri, uploaded) = report.into_result().unwrap();
    assert_eq!(
        primary_uri.as_deref(),
        Some("http://localhost:8080/media/images/mini_photo.jpg")
    );
    assert_eq!(uploaded.len(), 1);
    assert_eq!(uploaded[0].name, "photo.jpg");
    assert_eq!(uploaded[0].objects.len(), 2);

    let stored = root.path().join("images");
    assert_eq!(std::fs::read(stored.join("mini_photo.jpg")).unwrap(), b"jpeg bytes");
    assert!(stored.join("thumb_photo.jpg").is_file());

    let report = imager.remove("photo.jpg", Some("items")).await.unwrap();
    assert!(report.is_success());
    assert!(!stored.join("mini_photo.jpg").exists());
    assert!(!stored.join("thumb_photo.jpg").exists());

    // Gone already: still a success.
    let mut outcome = None;
    imager
        .remove_with(
            "photo.jpg",
            Some("items"),
            Some(|e: Option<ImagerError>| outcome = Some(e)),
        )
        .await
        .unwrap();
    assert!(matches!(outcome, Some(None)));

    imager
        .remove_with("photo.jpg", Some("items"), None::<fn(Option<ImagerError>)>)
        .await
        .unwrap();
}

#[tokio::test]
async fn should_fall_back_to_default_variant_and_rename_uploads() {
    let fixtures = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let temp = fixtures.path().join("upload_8f2a");
    std::fs::write(&temp, b"png bytes").unwrap();

    let imager = imager(root.path());
    let mut result = None;
    imager
        .upload_with(
            SourceAsset::upload(&temp, "C:\\Users\\me\\Avatar.PNG"),
            None,
            |error, uri, uploaded| result = Some((error, uri, uploaded)),
        )
        .await
        .unwrap();

    let (error, uri, uploaded) = result.unwrap();
    assert!(error.is_none());
    assert_eq!(uploaded[0].original_name, "Avatar.PNG");

    let name = &uploaded[0].name;
    assert_ne!(name, "Avatar.PNG");
    assert!(name.ends_with(".png"));
    assert_eq!(
        uri.unwrap(),
        format!("http://localhost:8080/media/images/small_{}", name)
    );
    assert!(root.path().join("images").join(format!("small_{}", name)).is_file());
}

#[tokio::test]
async fn should_refuse_missing_files_before_storing() {
    let root = tempfile::tempdir().unwrap();
    let imager = imager(root.path());

    let error = imager
        .upload("/definitely/not/here.jpg", Some("items"))
        .await
        .unwrap_err();
    assert_eq!(error.io_kind(), Some(std::io::ErrorKind::NotFound));
    assert!(!root.path().join("images").exists());
}
