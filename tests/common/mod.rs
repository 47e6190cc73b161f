//! Contract checks shared by every backend's integration tests.
//!
//! Each check takes freshly opened caches and leaves them emptied.

#![allow(dead_code)]

use std::time::Duration;

use chrono::{TimeZone, Utc};
use remember::{Cache, CacheError, CacheExt, Value};
use serde::{Deserialize, Serialize};

// == Helper Functions ==

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: u64,
    pub roles: Vec<String>,
    pub remember_me: bool,
}

// == Round-trip ==

pub async fn roundtrip_all_types(cache: &dyn Cache) -> anyhow::Result<()> {
    let when = Utc.with_ymd_and_hms(2023, 11, 5, 8, 15, 0).unwrap();

    cache.set("string", "bar".into(), None).await?;
    cache.set("int", 42i64.into(), None).await?;
    cache.set("float32", 1.5f32.into(), None).await?;
    cache.set("float64", (-2.25f64).into(), None).await?;
    cache.set("bool", true.into(), None).await?;
    cache.set("bytes", vec![0u8, 1, 254].into(), None).await?;
    cache.set("time", when.into(), None).await?;

    assert_eq!(cache.get("string").await?, Value::String("bar".to_string()));
    assert_eq!(cache.get_string("string").await?, "bar");
    assert_eq!(cache.get_int("int").await?, 42);
    assert_eq!(cache.get_float32("float32").await?, 1.5);
    assert_eq!(cache.get_float64("float32").await?, 1.5);
    assert_eq!(cache.get_float64("float64").await?, -2.25);
    assert!(cache.get_bool("bool").await?);
    assert_eq!(cache.get_bytes("bytes").await?, vec![0u8, 1, 254]);
    assert_eq!(cache.get_time("time").await?, when);

    cache.empty().await?;
    Ok(())
}

pub async fn overwrite_replaces_value(cache: &dyn Cache) -> anyhow::Result<()> {
    cache.set("key", "first".into(), None).await?;
    cache.set("key", 2i64.into(), None).await?;
    assert_eq!(cache.get_int("key").await?, 2);

    cache.empty().await?;
    Ok(())
}

pub async fn serialized_struct_roundtrip(cache: &dyn Cache) -> anyhow::Result<()> {
    let session = Session {
        user_id: 7,
        roles: vec!["admin".to_string(), "ops".to_string()],
        remember_me: true,
    };

    cache.set_serialized("session", &session, None).await?;
    let back: Session = cache.get_deserialized("session").await?;
    assert_eq!(back, session);

    let err = cache.get_string("session").await.unwrap_err();
    assert!(matches!(err, CacheError::TypeMismatch { found: "serialized", .. }));

    cache.empty().await?;
    Ok(())
}

// == Missing Keys ==

pub async fn missing_key_not_found(cache: &dyn Cache) -> anyhow::Result<()> {
    let err = cache.get("does-not-exist").await.unwrap_err();
    assert!(matches!(err, CacheError::NotFound(ref key) if key == "does-not-exist"));
    assert!(!cache.has("does-not-exist").await);
    Ok(())
}

pub async fn has_tracks_presence(cache: &dyn Cache) -> anyhow::Result<()> {
    cache.forget("foo").await?;
    assert!(!cache.has("foo").await, "foo found in cache, and it shouldn't be there");

    cache.set("foo", "bar".into(), None).await?;
    assert!(cache.has("foo").await, "foo not found in cache");

    cache.forget("foo").await?;
    assert!(!cache.has("foo").await);
    Ok(())
}

pub async fn forget_is_idempotent(cache: &dyn Cache) -> anyhow::Result<()> {
    cache.set("foo", "foo".into(), None).await?;
    cache.forget("foo").await?;
    cache.forget("foo").await?;
    cache.forget("never-set").await?;
    assert!(!cache.has("foo").await);
    Ok(())
}

// == Typed Accessors ==

pub async fn type_mismatch_is_reported(cache: &dyn Cache) -> anyhow::Result<()> {
    cache.set("name", "not a number".into(), None).await?;

    let err = cache.get_int("name").await.unwrap_err();
    match err {
        CacheError::TypeMismatch {
            key,
            expected,
            found,
        } => {
            assert_eq!(key, "name");
            assert_eq!(expected, "int");
            assert_eq!(found, "string");
        }
        other => panic!("expected TypeMismatch, got {other:?}"),
    }

    cache.set("count", 3i64.into(), None).await?;
    assert!(matches!(
        cache.get_string("count").await,
        Err(CacheError::TypeMismatch { .. })
    ));
    assert!(matches!(
        cache.get_time("count").await,
        Err(CacheError::TypeMismatch { .. })
    ));

    cache.empty().await?;
    Ok(())
}

// == Expiration ==

pub async fn ttl_expires(cache: &dyn Cache) -> anyhow::Result<()> {
    cache.set("short", "v".into(), Some(Duration::from_millis(1))).await?;
    cache.set("tiny", "v".into(), Some(Duration::from_nanos(1))).await?;
    tokio::time::sleep(Duration::from_millis(5)).await;

    assert!(matches!(cache.get("short").await, Err(CacheError::NotFound(_))));
    assert!(matches!(cache.get("tiny").await, Err(CacheError::NotFound(_))));
    assert!(!cache.has("short").await);
    Ok(())
}

pub async fn ttl_keeps_value_until_elapsed(cache: &dyn Cache) -> anyhow::Result<()> {
    cache.set("foo2", "bar".into(), Some(Duration::from_millis(300))).await?;
    assert_eq!(cache.get_string("foo2").await?, "bar");

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!cache.has("foo2").await, "cache has foo2 and it should have expired");
    Ok(())
}

pub async fn zero_ttl_never_expires(cache: &dyn Cache) -> anyhow::Result<()> {
    cache.set("zero", "v".into(), Some(Duration::ZERO)).await?;
    cache.set("none", "v".into(), None).await?;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(cache.get_string("zero").await?, "v");
    assert_eq!(cache.get_string("none").await?, "v");

    cache.empty().await?;
    Ok(())
}

// == Bulk Deletion ==

pub async fn empty_by_match_is_precise(cache: &dyn Cache) -> anyhow::Result<()> {
    cache.set("alpha", "beta".into(), None).await?;
    cache.set("alpha2", "beta2".into(), None).await?;
    cache.set("beta", "beta".into(), None).await?;
    cache.set("xalpha", "contains, does not start with".into(), None).await?;

    let removed = cache.empty_by_match("a").await?;
    assert_eq!(removed, 2);

    assert!(!cache.has("alpha").await, "alpha found in cache, and it shouldn't be there");
    assert!(!cache.has("alpha2").await, "alpha2 found in cache, and it shouldn't be there");
    assert!(cache.has("beta").await, "beta not found in cache");
    assert!(cache.has("xalpha").await, "xalpha not found in cache");

    cache.empty().await?;
    Ok(())
}

pub async fn empty_by_match_treats_glob_literally(cache: &dyn Cache) -> anyhow::Result<()> {
    cache.set("a*b", "1".into(), None).await?;
    cache.set("axb", "2".into(), None).await?;

    cache.empty_by_match("a*").await?;
    assert!(!cache.has("a*b").await);
    assert!(cache.has("axb").await, "glob characters must match literally");

    cache.empty().await?;
    Ok(())
}

pub async fn empty_removes_everything(cache: &dyn Cache) -> anyhow::Result<()> {
    for i in 0..25 {
        cache.set(&format!("item{i}"), i64::from(i).into(), None).await?;
    }

    let removed = cache.empty().await?;
    assert_eq!(removed, 25);
    assert!(!cache.has("item0").await);
    assert_eq!(cache.empty().await?, 0);
    Ok(())
}

// == Namespace Isolation ==

/// `a` and `b` share one store under different prefixes.
pub async fn prefixes_are_isolated(a: &dyn Cache, b: &dyn Cache) -> anyhow::Result<()> {
    assert_ne!(a.prefix(), b.prefix());

    a.set("shared", "from a".into(), None).await?;
    b.set("shared", "from b".into(), None).await?;
    a.set("alpha", 1i64.into(), None).await?;
    b.set("alpha", 2i64.into(), None).await?;

    assert_eq!(a.get_string("shared").await?, "from a");
    assert_eq!(b.get_string("shared").await?, "from b");

    a.set("only-a", true.into(), None).await?;
    assert!(!b.has("only-a").await);

    b.empty_by_match("al").await?;
    assert_eq!(a.get_int("alpha").await?, 1);
    assert!(!b.has("alpha").await);

    a.empty().await?;
    assert!(!a.has("shared").await);
    assert_eq!(b.get_string("shared").await?, "from b");

    b.empty().await?;
    Ok(())
}

// == Close ==

pub async fn closed_cache_rejects_calls(cache: &dyn Cache) -> anyhow::Result<()> {
    cache.set("k", "v".into(), None).await?;
    cache.close().await?;

    assert!(matches!(cache.get("k").await, Err(CacheError::Closed)));
    assert!(matches!(
        cache.set("k", "v".into(), None).await,
        Err(CacheError::Closed)
    ));
    assert!(matches!(cache.forget("k").await, Err(CacheError::Closed)));
    assert!(matches!(cache.empty().await, Err(CacheError::Closed)));
    assert!(matches!(cache.purge_expired().await, Err(CacheError::Closed)));
    assert!(!cache.has("k").await);

    cache.close().await?;
    Ok(())
}
