//! Integration Tests for the public cache API
//!
//! Exercises capacity eviction, TTL expiration, purge, resize and shutdown
//! through `expirable_cache::Cache` only.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use expirable_cache::{Cache, CacheConfig};

// == Helper Functions ==

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "expirable_cache=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

type Evicted<K, V> = Arc<Mutex<Vec<(K, V)>>>;

fn recording_cache<K, V>(capacity: usize, ttl: Duration) -> (Cache<K, V>, Evicted<K, V>)
where
    K: Eq + std::hash::Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    let evicted: Evicted<K, V> = Arc::new(Mutex::new(Vec::new()));
    let sink = evicted.clone();
    let cache = Cache::builder()
        .capacity(capacity)
        .ttl(ttl)
        .on_evict(move |k: &K, v: &V| sink.lock().unwrap().push((k.clone(), v.clone())))
        .build()
        .unwrap();
    (cache, evicted)
}

// == Capacity Eviction ==

#[test]
fn test_capacity_eviction() {
    init_tracing();
    let (cache, evicted) = recording_cache::<&str, i32>(2, Duration::ZERO);

    assert!(!cache.add("A", 1));
    assert_eq!(cache.len(), 1);
    assert!(!cache.add("B", 2));
    assert_eq!(cache.len(), 2);
    assert!(cache.add("C", 3));
    assert_eq!(cache.len(), 2);

    assert!(!cache.contains("A"));
    assert!(cache.contains("B"));
    assert!(cache.contains("C"));
    assert_eq!(*evicted.lock().unwrap(), vec![("A", 1)]);
}

#[test]
fn test_get_protects_from_eviction_but_peek_does_not() {
    let cache: Cache<&str, i32> = Cache::new(2, None, Duration::ZERO).unwrap();

    cache.add("A", 1);
    cache.add("B", 2);
    assert_eq!(cache.get("A"), Some(1));
    cache.add("C", 3);
    assert!(cache.contains("A"));
    assert!(!cache.contains("B"));

    assert_eq!(cache.peek("A"), Some(1));
    cache.add("D", 4);
    assert!(!cache.contains("A"), "Peek must not refresh recency");
}

#[test]
fn test_oldest_accessors() {
    let cache: Cache<String, i32> = Cache::new(0, None, Duration::ZERO).unwrap();
    cache.add("first".to_string(), 1);
    cache.add("second".to_string(), 2);

    assert_eq!(cache.get_oldest(), Some(("first".to_string(), 1)));
    assert_eq!(cache.remove_oldest(), Some(("first".to_string(), 1)));
    assert_eq!(cache.get_oldest(), Some(("second".to_string(), 2)));
    assert_eq!(cache.keys(), vec!["second".to_string()]);
}

// == Purge ==

#[test]
fn test_purge_invokes_callback_per_entry() {
    init_tracing();
    let (cache, evicted) = recording_cache::<String, u32>(0, Duration::ZERO);
    for i in 0..5u32 {
        cache.add(format!("key{}", i), i);
    }

    cache.purge();

    assert_eq!(cache.len(), 0);
    let seen: HashSet<(String, u32)> = evicted.lock().unwrap().iter().cloned().collect();
    let expected: HashSet<(String, u32)> = (0..5u32).map(|i| (format!("key{}", i), i)).collect();
    assert_eq!(evicted.lock().unwrap().len(), 5);
    assert_eq!(seen, expected);
}

// == Resize ==

#[test]
fn test_resize() {
    let (cache, evicted) = recording_cache::<u32, u32>(10, Duration::ZERO);
    for i in 0..10 {
        cache.add(i, i);
    }

    assert_eq!(cache.resize(4), 6);
    assert_eq!(cache.len(), 4);
    assert_eq!(cache.keys(), vec![6, 7, 8, 9]);
    assert_eq!(evicted.lock().unwrap().len(), 6);

    assert_eq!(cache.resize(20), 0);
    assert_eq!(cache.capacity(), 20);
    assert_eq!(cache.len(), 4);
}

// == TTL Expiration ==

#[tokio::test(start_paused = true)]
async fn test_ttl_expiration() {
    init_tracing();
    let (cache, evicted) = recording_cache::<&str, &str>(0, Duration::from_millis(100));

    cache.add("X", "v");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(cache.get("X"), Some("v"));

    tokio::time::sleep(Duration::from_millis(52)).await;
    assert_eq!(cache.get("X"), None);
    assert_eq!(*evicted.lock().unwrap(), vec![("X", "v")]);
    assert_eq!(cache.stats().expirations, 1);

    cache.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_entry_never_expires_before_ttl() {
    let cache: Cache<u32, u32> = Cache::new(0, None, Duration::from_millis(100)).unwrap();

    // Spread inserts over several buckets
    for i in 0..10u32 {
        cache.add(i, i);
        tokio::time::sleep(Duration::from_millis(7)).await;
    }
    // t = 70ms: the first entry is 70ms old and must still be there
    for i in 0..10u32 {
        assert!(cache.contains(&i), "Key {} expired early", i);
    }

    // t = 220ms: well past every deadline (latest at 163ms)
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(cache.is_empty());

    cache.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_short_ttl_expires_within_one_rotation() {
    let cache: Cache<&str, u32> = Cache::new(0, None, Duration::from_millis(10)).unwrap();
    cache.add("x", 1);

    tokio::time::sleep(Duration::from_millis(9)).await;
    assert!(cache.contains("x"), "Entry expired before its TTL");

    // Gone within ttl plus one 1ms tick
    tokio::time::sleep(Duration::from_millis(3)).await;
    assert!(!cache.contains("x"));
    assert_eq!(cache.stats().expirations, 1);

    cache.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_refresh_extends_lifetime() {
    let cache: Cache<&str, u32> = Cache::new(0, None, Duration::from_millis(100)).unwrap();
    cache.add("k", 1);

    tokio::time::sleep(Duration::from_millis(80)).await;
    cache.add("k", 2);

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(cache.get("k"), Some(2), "Refreshed entry must survive the old deadline");

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!cache.contains("k"));

    cache.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_read_path_expiry_visibility() {
    // Sweeper stopped so expired entries stay physically present
    let cache: Cache<&str, u32> = Cache::new(0, None, Duration::from_millis(100)).unwrap();
    cache.close().await.unwrap();

    cache.add("old", 1);
    tokio::time::sleep(Duration::from_millis(100)).await;
    cache.add("new", 2);

    // Lazy: get, peek, contains, keys, len
    assert_eq!(cache.get("old"), Some(1));
    assert_eq!(cache.peek("old"), Some(1));
    assert!(cache.contains("old"));
    assert_eq!(cache.keys(), vec!["new", "old"]);
    assert_eq!(cache.len(), 2);

    // Strict: get_live, peek_live, values
    assert_eq!(cache.get_live("old"), None);
    assert_eq!(cache.peek_live("old"), None);
    assert_eq!(cache.get_live("new"), Some(2));
    assert_eq!(cache.values(), vec![2]);
    assert!(cache.expires_at("old").is_some());
}

#[tokio::test]
async fn test_ttl_expiration_real_clock() {
    let cache: Cache<String, String> = Cache::new(0, None, Duration::from_millis(200)).unwrap();
    cache.add("key".to_string(), "value".to_string());
    assert_eq!(cache.get("key"), Some("value".to_string()));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(cache.get("key"), None);

    cache.close().await.unwrap();
}

#[test]
fn test_ttl_without_runtime_is_rejected() {
    let result: expirable_cache::Result<Cache<u32, u32>> =
        Cache::new(0, None, Duration::from_secs(1));
    assert!(matches!(
        result,
        Err(expirable_cache::CacheError::RuntimeUnavailable(_))
    ));
}

// == Configuration ==

#[tokio::test]
async fn test_from_config() {
    let config = CacheConfig::new(3, Duration::from_secs(60));
    let cache: Cache<u32, u32> = Cache::from_config(&config).unwrap();

    assert_eq!(cache.capacity(), 3);
    assert_eq!(cache.ttl(), Some(Duration::from_secs(60)));
    assert!(cache.is_sweeping());

    cache.close().await.unwrap();
    assert!(!cache.is_sweeping());
}

// == Concurrency ==

#[test]
fn test_concurrent_access() {
    let cache: Arc<Cache<u32, u32>> = Arc::new(Cache::new(100, None, Duration::ZERO).unwrap());

    let handles: Vec<_> = (0..4u32)
        .map(|t| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..500u32 {
                    let key = (t * 500 + i) % 150;
                    cache.add(key, i);
                    let _ = cache.get(&key);
                    if i % 7 == 0 {
                        cache.remove(&key);
                    }
                    assert!(cache.len() <= 100);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(cache.len() <= 100);
    assert_eq!(cache.keys().len(), cache.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_access_with_sweeper() {
    let cache: Arc<Cache<u32, u32>> =
        Arc::new(Cache::new(0, None, Duration::from_millis(50)).unwrap());

    let writers: Vec<_> = (0..4u32)
        .map(|t| {
            let cache = cache.clone();
            tokio::task::spawn_blocking(move || {
                for i in 0..200u32 {
                    cache.add(t * 1000 + i, i);
                }
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(cache.is_empty());

    cache.close().await.unwrap();
}
