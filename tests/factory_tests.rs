//! Integration Tests for backend selection

use remember::{open, open_named, BackendKind, CacheError, Options};
use tempfile::TempDir;

#[tokio::test]
async fn unknown_backend_is_rejected() {
    let err = open_named("memcached", Options::default()).await.err().unwrap();
    assert!(matches!(err, CacheError::UnsupportedBackend(name) if name == "memcached"));
}

#[tokio::test]
async fn named_backends_open_the_right_kind() -> anyhow::Result<()> {
    let dir = TempDir::new()?;

    let sled = open_named(
        "sled",
        Options::for_backend(BackendKind::Sled).with_path(dir.path().join("s")),
    )
    .await?;
    assert_eq!(sled.kind(), BackendKind::Sled);

    let redb = open_named("REDB", Options::for_backend(BackendKind::Redb).with_prefix("x")).await?;
    assert_eq!(redb.kind(), BackendKind::Redb);
    assert_eq!(redb.prefix(), "x");

    sled.close().await?;
    redb.close().await?;
    Ok(())
}

#[tokio::test]
async fn empty_path_is_invalid_for_embedded_backends() {
    for kind in [BackendKind::Sled, BackendKind::Redb] {
        let options = Options::for_backend(kind).with_path("");
        let err = open(kind, options).await.err().unwrap();
        assert!(matches!(err, CacheError::InvalidConfig(_)), "{kind}: {err:?}");
    }
}
