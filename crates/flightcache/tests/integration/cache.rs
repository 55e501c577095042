use std::time::Duration;

use flightcache::{CacheError, GetOptions};
use serde_json::json;

use crate::{Counter, setup_cache};

#[tokio::test]
async fn test_pull_from_cache() {
    let cache = setup_cache();

    let x = cache
        .get("foo", GetOptions::default(), || async { Ok(json!({ "foo": "bar" })) })
        .unwrap()
        .await
        .unwrap();
    let y = cache
        .get("foo", GetOptions::default(), || async { Ok(json!({ "baz": "wiz" })) })
        .unwrap()
        .await
        .unwrap();
    assert_eq!(x, json!({ "foo": "bar" }));
    assert_eq!(y, x);

    cache.clear(Some("foo"));

    let z = cache
        .get("foo", GetOptions::default(), || async { Ok(json!({ "baz": "wiz" })) })
        .unwrap()
        .await
        .unwrap();
    assert_eq!(z, json!({ "baz": "wiz" }));
}

#[tokio::test]
async fn test_queue_async_calls() {
    let cache = setup_cache();
    let counter = Counter::default();

    let lookup = || {
        let counter = counter.clone();
        cache
            .get("foo", GetOptions::default(), move || async move {
                counter.hit();
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(42)
            })
            .unwrap()
    };

    let (a, b, c) = tokio::join!(lookup(), lookup(), lookup());
    assert_eq!((a.unwrap(), b.unwrap(), c.unwrap()), (42, 42, 42));
    assert_eq!(counter.get(), 1);
}

#[tokio::test]
async fn test_catch_errors() {
    let cache = setup_cache::<u32>();

    let err = cache
        .get("foo", GetOptions::default(), || async {
            anyhow::bail!("oh snap")
        })
        .unwrap()
        .await
        .unwrap_err();

    assert!(matches!(err, CacheError::ComputationFailure(_)));
    assert_eq!(err.to_string(), "oh snap");
}

#[tokio::test]
async fn test_timeout_does_not_affect_other_waiters() {
    let cache = setup_cache();
    let counter = Counter::default();

    let slow = {
        let counter = counter.clone();
        move || async move {
            counter.hit();
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok("slow")
        }
    };

    let impatient = cache.get("foo", GetOptions::default(), slow).unwrap();
    let patient = cache
        .get("foo", GetOptions::default(), || async { Ok("unused") })
        .unwrap();

    let timed_out = tokio::time::timeout(Duration::from_millis(1), impatient).await;
    assert!(timed_out.is_err());

    assert_eq!(patient.await.unwrap(), "slow");
    assert_eq!(counter.get(), 1);
}

#[tokio::test]
async fn test_hashed_namespaces() {
    let cache = setup_cache();
    let counter = Counter::default();

    let config = json!({ "url": "https://example.com", "retries": 3 });

    for _ in 0..2 {
        let namespace = flightcache_utils::sha1(config.to_string());
        let len = namespace.len();
        let counter = counter.clone();
        let value = cache
            .get(&namespace, GetOptions::default(), move || async move {
                counter.hit();
                Ok(len)
            })
            .unwrap()
            .await
            .unwrap();
        assert_eq!(value, 40);
    }
    assert_eq!(counter.get(), 1);

    // a salted namespace does not collide with the plain one
    let salted = format!(
        "{}-{}",
        flightcache_utils::sha1(config.to_string()),
        flightcache_utils::random_bytes(4)
    );
    let counter2 = counter.clone();
    cache
        .get(&salted, GetOptions::default(), move || async move {
            counter2.hit();
            Ok(0)
        })
        .unwrap()
        .await
        .unwrap();
    assert_eq!(counter.get(), 2);
}
