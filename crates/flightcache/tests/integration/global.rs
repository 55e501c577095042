use flightcache::{GetOptions, global};
use serde_json::json;

use crate::Counter;

// The global cache is shared by the whole test binary, keep everything touching it in one test.
#[tokio::test]
async fn test_global_cache() {
    flightcache_test::setup();
    let counter = Counter::default();

    let lookup = |namespace: &'static str, value: serde_json::Value| {
        let counter = counter.clone();
        global::get(namespace, GetOptions::default(), move || async move {
            counter.hit();
            Ok(value)
        })
        .unwrap()
    };

    assert_eq!(lookup("global-foo", json!(1)).await.unwrap(), json!(1));
    assert_eq!(lookup("global-foo", json!(2)).await.unwrap(), json!(1));
    assert_eq!(lookup("global-bar", json!(null)).await.unwrap(), json!(null));
    assert_eq!(lookup("global-bar", json!(3)).await.unwrap(), json!(null));
    assert_eq!(counter.get(), 2);

    // handles share the same entries
    let value = global::cache()
        .clone()
        .get("global-foo", GetOptions::default(), || async { Ok(json!(9)) })
        .unwrap()
        .await
        .unwrap();
    assert_eq!(value, json!(1));

    global::clear(Some("global-foo"));
    assert_eq!(lookup("global-foo", json!(4)).await.unwrap(), json!(4));
    assert_eq!(lookup("global-bar", json!(5)).await.unwrap(), json!(null));

    global::clear(None);
    assert_eq!(lookup("global-foo", json!(6)).await.unwrap(), json!(6));
    assert_eq!(lookup("global-bar", json!(7)).await.unwrap(), json!(7));
    assert_eq!(counter.get(), 5);

    assert!(global::get("", GetOptions::default(), || async { Ok(json!(0)) }).is_err());
}
