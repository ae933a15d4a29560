// Cache store TTL and round-trip behaviour

mod common;

use common::{TestStore, phonetic_identity, translation_identity};
use lyrebird_core::{Identity, LyricsPayload, Variant};
use serde_json::json;

#[tokio::test]
async fn test_put_then_get_returns_payload_and_metadata() {
    let t = TestStore::new();
    let cache = t.store.cache();
    let id = phonetic_identity();
    let payload = LyricsPayload::phonetic("kataomoi\nde ii", Some("ja"));

    let written = cache.put(&id, payload.clone()).await.unwrap();
    let read = cache.get(&id).await.unwrap().expect("entry within TTL");

    assert_eq!(read.payload, payload);
    assert_eq!(read.artist, "Aimer");
    assert_eq!(read.title, "Kataomoi");
    assert!(read.is_phonetic);
    assert_eq!(read.provider, "Spotify");
    assert_eq!(read.translated_at, written.translated_at);
    assert_eq!(read.cached, Some(true));
}

#[tokio::test]
async fn test_entry_expires_after_ttl_but_file_remains() {
    let t = TestStore::new();
    let cache = t.store.cache();
    let id = translation_identity();
    cache.put(&id, LyricsPayload::translation(vec!["a"])).await.unwrap();

    t.advance(30 * 24 * 60 * 60 - 60);
    assert!(cache.get(&id).await.unwrap().is_some());

    t.advance(120);
    assert!(cache.get(&id).await.unwrap().is_none());
    assert!(cache.cache_path(&id).exists());
}

#[tokio::test]
async fn test_put_overwrites_expired_entry() {
    let t = TestStore::new();
    let cache = t.store.cache();
    let id = translation_identity();
    cache.put(&id, LyricsPayload::translation("old")).await.unwrap();

    t.advance(31 * 24 * 60 * 60);
    assert!(cache.get(&id).await.unwrap().is_none());

    // The rewrite gets a real-time mtime; bring the clock back in line
    t.clock.set(time::OffsetDateTime::now_utc());
    cache.put(&id, LyricsPayload::translation("new")).await.unwrap();
    let entry = cache.get(&id).await.unwrap().unwrap();
    assert_eq!(entry.payload, LyricsPayload::translation("new"));
}

#[tokio::test]
async fn test_provider_is_taken_from_request() {
    let t = TestStore::new();
    let cache = t.store.cache();
    let id = Identity::new("YOASOBI", "Idol", Variant::Translation, "Apple Music");
    cache.put(&id, LyricsPayload::translation("x")).await.unwrap();

    // Tamper with the stored provider; reads report the requested one
    let path = cache.cache_path(&id);
    let mut value: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    value["provider"] = json!("something else");
    std::fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

    let entry = cache.get(&id).await.unwrap().unwrap();
    assert_eq!(entry.provider, "Apple Music");
    assert!(path.ends_with("YOASOBI/Idol/translation_Apple_Music.json"));
}

#[tokio::test]
async fn test_colliding_identities_share_an_entry() {
    let t = TestStore::new();
    let cache = t.store.cache();
    let plain = Identity::with_default_provider("Artist", "Song", Variant::Translation);
    let noisy = Identity::with_default_provider("Artist", "Song\u{1}", Variant::Translation);

    cache.put(&plain, LyricsPayload::translation("shared")).await.unwrap();
    let entry = cache.get(&noisy).await.unwrap().unwrap();
    assert_eq!(entry.payload, LyricsPayload::translation("shared"));
}

#[tokio::test]
async fn test_stats_counts_tree() {
    let t = TestStore::new();
    let cache = t.store.cache();
    cache.put(&translation_identity(), LyricsPayload::translation("a")).await.unwrap();
    cache.put(&phonetic_identity(), LyricsPayload::phonetic("b", None)).await.unwrap();

    let stats = cache.stats().await.unwrap();
    assert_eq!(stats.total_artists, 2);
    assert_eq!(stats.total_songs, 2);
    assert_eq!(stats.total_translations, 1);
    assert_eq!(stats.total_phonetics, 1);
    let on_disk: u64 = [
        cache.cache_path(&translation_identity()),
        cache.cache_path(&phonetic_identity()),
    ]
    .iter()
    .map(|p| std::fs::metadata(p).unwrap().len())
    .sum();
    assert_eq!(stats.cache_size_bytes, on_disk);
}
