use axum::body::Bytes;
use bakbak::{
    models::MediaKind,
    services::{UploadError, UploadPurpose, UploadStore},
};
use tempfile::TempDir;

fn chunks(parts: &[&[u8]]) -> std::vec::IntoIter<Bytes> {
    parts
        .iter()
        .map(|p| Bytes::copy_from_slice(p))
        .collect::<Vec<_>>()
        .into_iter()
}

fn files_in(dir: &TempDir) -> usize {
    std::fs::read_dir(dir.path()).unwrap().count()
}

#[tokio::test]
async fn test_store_writes_unique_safe_name() {
    let dir = TempDir::new().unwrap();
    let store = UploadStore::new(dir.path(), 1024);

    let stored = store
        .store(UploadPurpose::Meme, "my cat (1).JPG", &mut chunks(&[b"abc", b"def"]))
        .await
        .unwrap();

    assert_eq!(stored.size, 6);
    assert_eq!(stored.media_kind, MediaKind::Image);
    let (prefix, rest) = stored.file_name.split_once('_').unwrap();
    assert_eq!(prefix.len(), 32);
    assert!(prefix.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(rest, "my_cat__1_.JPG");
    assert_eq!(std::fs::read(&stored.path).unwrap(), b"abcdef");
    assert_eq!(store.resolve(&stored.file_name), Some(stored.path.clone()));
}

#[tokio::test]
async fn test_two_uploads_with_same_name_do_not_collide() {
    let dir = TempDir::new().unwrap();
    let store = UploadStore::new(dir.path(), 1024);

    let a = store
        .store(UploadPurpose::TwisterRecording, "take.wav", &mut chunks(&[b"one"]))
        .await
        .unwrap();
    let b = store
        .store(UploadPurpose::TwisterRecording, "take.wav", &mut chunks(&[b"two"]))
        .await
        .unwrap();

    assert_ne!(a.file_name, b.file_name);
    assert_eq!(files_in(&dir), 2);
}

#[tokio::test]
async fn test_oversized_upload_is_removed() {
    let dir = TempDir::new().unwrap();
    let store = UploadStore::new(dir.path(), 4);

    let result = store
        .store(UploadPurpose::DareProof, "clip.mp4", &mut chunks(&[b"abc", b"def"]))
        .await;

    assert!(matches!(result, Err(UploadError::TooLarge { .. })));
    assert_eq!(files_in(&dir), 0);
}

#[tokio::test]
async fn test_empty_upload_is_removed() {
    let dir = TempDir::new().unwrap();
    let store = UploadStore::new(dir.path(), 1024);

    let result = store
        .store(UploadPurpose::Meme, "blank.png", &mut chunks(&[]))
        .await;

    assert!(matches!(result, Err(UploadError::Empty)));
    assert_eq!(files_in(&dir), 0);
}

#[tokio::test]
async fn test_wrong_type_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let store = UploadStore::new(dir.path(), 1024);

    let result = store
        .store(UploadPurpose::TwisterRecording, "song.mp4", &mut chunks(&[b"data"]))
        .await;

    match result {
        Err(UploadError::UnsupportedType { allowed }) => assert_eq!(allowed, "mp3, wav"),
        other => panic!("expected UnsupportedType, got {:?}", other),
    }
    assert_eq!(files_in(&dir), 0);
}

#[tokio::test]
async fn test_size_message_uses_megabytes() {
    let store = UploadStore::new("unused", 100 * 1024 * 1024);
    let err = UploadError::TooLarge {
        limit_mb: store.limit_mb(),
    };
    assert_eq!(err.to_string(), "File size must be under 100 MB.");
}

#[tokio::test]
async fn test_ensure_dir_creates_nested_directory() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("a").join("b");
    let store = UploadStore::new(&nested, 1024);
    store.ensure_dir().await.unwrap();
    assert!(nested.is_dir());
}
