//! End-to-end tests against mocked upstreams.

use boorufetch::error::AppError;
use boorufetch::models::{Config, Rating, Tag, TagCategory, Upstream};
use boorufetch::{Booru, pipeline};
use wiremock::matchers::{any, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HASH: &str = "39b1f4f5298c446b483b858335d85fc7";

const DANBOORU_LISTING: &str = r#"[
  {
    "id": 1,
    "md5": "39b1f4f5298c446b483b858335d85fc7",
    "rating": "g",
    "file_url": "https://cdn.donmai.us/original/39/b1/39b1f4f5298c446b483b858335d85fc7.png",
    "large_file_url": "https://cdn.donmai.us/sample/39/b1/sample-39b1f4f5298c446b483b858335d85fc7.jpg",
    "has_large": true,
    "image_width": 1200,
    "image_height": 1600,
    "source": "",
    "created_at": "2020-10-10T12:34:56.789-04:00",
    "updated_at": "2021-01-02T03:04:05.000-05:00",
    "tag_string_artist": "someone",
    "tag_string_character": "sakura_kyouko",
    "tag_string_copyright": "mahou_shoujo_madoka_magica",
    "tag_string_general": "1girl solo",
    "tag_string_meta": ""
  },
  {
    "id": 2,
    "md5": "d41d8cd98f00b204e9800998ecf8427e",
    "rating": "e",
    "file_url": "https://cdn.donmai.us/original/d4/1d/d41d8cd98f00b204e9800998ecf8427e.jpg",
    "large_file_url": null,
    "has_large": false,
    "image_width": 640,
    "image_height": 480,
    "source": "https://twitter.com/someone/status/2",
    "created_at": "2019-01-01T00:00:00.000Z",
    "updated_at": null,
    "tag_string_artist": "",
    "tag_string_character": "",
    "tag_string_copyright": "",
    "tag_string_general": "landscape",
    "tag_string_meta": "highres"
  }
]"#;

const DANBOORU_LOOKUP: &str = r#"{
  "md5": "39b1f4f5298c446b483b858335d85fc7",
  "rating": "q",
  "file_url": "https://cdn.donmai.us/original/39/b1/39b1f4f5298c446b483b858335d85fc7.png",
  "created_at": "2020-10-10T12:34:56.000-04:00",
  "updated_at": "2023-03-03T03:03:03.000Z",
  "tag_string_artist": "someone",
  "tag_string_general": "1girl"
}"#;

const GELBOORU_POST_PAGE: &str = r##"<html><body>
  <ul id="tag-list">
    <li><b>Tags</b></li>
    <li class="tag-type-artist"><a href="#">?</a> <a href="#">someone</a> <span>3</span></li>
    <li class="tag-type-character"><a href="#">?</a> <a href="#">sakura kyouko</a></li>
    <li class="tag-type-general"><a href="#">?</a> <a href="#">1girl</a></li>
    <li class="tag-type-metadata"><a href="#">?</a> <a href="#">highres</a></li>
  </ul>
</body></html>"##;

fn gelbooru_listing(source: &str) -> String {
    format!(
        r#"{{
  "@attributes": {{"limit": 100, "offset": 0, "count": 1}},
  "post": [{{
    "id": 7,
    "md5": "{HASH}",
    "rating": "sensitive",
    "file_url": "https://img3.gelbooru.com/images/39/b1/{HASH}.png",
    "sample": 1,
    "sample_url": "",
    "directory": "39/b1",
    "source": "{source}",
    "width": 2400,
    "height": 3200,
    "created_at": "Sat Oct 10 12:34:56 -0500 2020",
    "change": 1700000000
  }}]
}}"#
    )
}

fn test_config(danbooru: &MockServer, gelbooru: &MockServer) -> Config {
    let mut config = Config::default();
    config.dispatcher.workers = 2;
    config.dispatcher.backoff_secs = 0;
    config.danbooru.base_url = danbooru.uri();
    config.gelbooru.base_url = gelbooru.uri();
    config.gelbooru.sample_base_url = "https://img3.gelbooru.com".to_string();
    config
}

async fn servers() -> (MockServer, MockServer) {
    (MockServer::start().await, MockServer::start().await)
}

#[tokio::test]
async fn test_danbooru_query_resolves_every_field() {
    let (danbooru, gelbooru) = servers().await;
    Mock::given(method("GET"))
        .and(path("/posts.json"))
        .and(query_param("tags", "sakura_kyouko"))
        .and(query_param("page", "0"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(DANBOORU_LISTING, "application/json"))
        .expect(1)
        .mount(&danbooru)
        .await;

    let booru = Booru::new(&test_config(&danbooru, &gelbooru)).expect("Failed to build booru");
    let posts = pipeline::run_query(&booru, Upstream::Danbooru, "sakura_kyouko", 0, 2)
        .await
        .expect("query failed");

    assert_eq!(posts.len(), 2);

    let first = &posts[0];
    assert_eq!(first.md5, HASH);
    assert_eq!(first.rating, Rating::General);
    assert!(first.sample_url.contains("/sample/"));
    assert_eq!(first.source_url, None);
    assert_eq!((first.width, first.height), (1200, 1600));
    assert_eq!(first.tags.len(), 5);
    assert_eq!(first.tags.as_slice()[0], Tag::new(TagCategory::Author, "someone"));
    assert_eq!(first.created_on.to_rfc3339(), "2020-10-10T16:34:56+00:00");
    assert_eq!(first.updated_on.to_rfc3339(), "2021-01-02T08:04:05+00:00");

    let second = &posts[1];
    assert_eq!(second.rating, Rating::Explicit);
    assert_eq!(second.sample_url, second.file_url);
    // Missing update time falls back to creation time.
    assert_eq!(second.updated_on, second.created_on);
    assert_eq!(second.tags.of_category(TagCategory::Meta).count(), 1);

    booru.shutdown().await;
}

#[tokio::test]
async fn test_danbooru_lookup_of_unknown_hash_is_none() {
    let (danbooru, gelbooru) = servers().await;
    Mock::given(method("GET"))
        .and(path("/posts.json"))
        .and(query_param("md5", HASH))
        .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"success": false}"#))
        .expect(1)
        .mount(&danbooru)
        .await;

    let booru = Booru::new(&test_config(&danbooru, &gelbooru)).expect("Failed to build booru");
    let post = pipeline::run_lookup(&booru, Upstream::Danbooru, HASH)
        .await
        .expect("lookup failed");
    assert!(post.is_none());
}

#[tokio::test]
async fn test_malformed_hash_never_reaches_upstream() {
    let (danbooru, gelbooru) = servers().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&danbooru)
        .await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&gelbooru)
        .await;

    let booru = Booru::new(&test_config(&danbooru, &gelbooru)).expect("Failed to build booru");
    for hash in ["xyz", "39b1f4f5298c446b483b858335d85fc", "g9b1f4f5298c446b483b858335d85fc7"] {
        let result = pipeline::run_lookup(&booru, Upstream::Gelbooru, hash).await;
        assert!(matches!(result, Err(AppError::InvalidHash(_))), "{hash}");
    }
}

#[tokio::test]
async fn test_gelbooru_query_scrapes_tags() {
    let (danbooru, gelbooru) = servers().await;
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("page", "dapi"))
        .and(query_param("json", "1"))
        .and(query_param("pid", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            gelbooru_listing("https://www.pixiv.net/artworks/1"),
            "application/json",
        ))
        .expect(1)
        .mount(&gelbooru)
        .await;
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("page", "post"))
        .and(query_param("tags", format!("md5:{HASH}")))
        .respond_with(ResponseTemplate::new(200).set_body_raw(GELBOORU_POST_PAGE, "text/html"))
        .expect(1)
        .mount(&gelbooru)
        .await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&danbooru)
        .await;

    let booru = Booru::new(&test_config(&danbooru, &gelbooru)).expect("Failed to build booru");
    let posts = pipeline::run_query(&booru, Upstream::Gelbooru, "sakura_kyouko", 0, 100)
        .await
        .expect("query failed");

    assert_eq!(posts.len(), 1);
    let post = &posts[0];
    assert_eq!(post.rating, Rating::Sensitive);
    assert_eq!(
        post.sample_url,
        format!("https://img3.gelbooru.com/samples/39/b1/sample_{HASH}.jpg")
    );
    assert_eq!(
        post.tags.as_slice(),
        [
            Tag::new(TagCategory::Author, "someone"),
            Tag::new(TagCategory::Character, "sakura_kyouko"),
            Tag::new(TagCategory::Unclassified, "1girl"),
            Tag::new(TagCategory::Meta, "highres"),
        ]
    );
    assert_eq!(post.created_on.to_rfc3339(), "2020-10-10T17:34:56+00:00");
    assert_eq!(post.updated_on.timestamp(), 1_700_000_000);

    booru.shutdown().await;
}

#[tokio::test]
async fn test_gelbooru_post_from_danbooru_is_cross_referenced() {
    let (danbooru, gelbooru) = servers().await;
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("page", "dapi"))
        .and(query_param("tags", format!("md5:{HASH}")))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            gelbooru_listing("https://danbooru.donmai.us/posts/1"),
            "application/json",
        ))
        .expect(1)
        .mount(&gelbooru)
        .await;
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("page", "post"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(GELBOORU_POST_PAGE, "text/html"))
        .expect(0)
        .mount(&gelbooru)
        .await;
    Mock::given(method("GET"))
        .and(path("/posts.json"))
        .and(query_param("md5", HASH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(DANBOORU_LOOKUP, "application/json"))
        .expect(1)
        .mount(&danbooru)
        .await;

    let booru = Booru::new(&test_config(&danbooru, &gelbooru)).expect("Failed to build booru");
    let post = pipeline::run_lookup(&booru, Upstream::Gelbooru, HASH)
        .await
        .expect("lookup failed")
        .expect("post should exist");

    // Gated fields come from Danbooru, the rest from Gelbooru.
    assert_eq!(post.rating, Rating::Questionable);
    assert_eq!(post.updated_on.to_rfc3339(), "2023-03-03T03:03:03+00:00");
    assert_eq!(post.tags.len(), 2);
    assert_eq!((post.width, post.height), (2400, 3200));
    assert!(post.file_url.starts_with("https://img3.gelbooru.com/images/"));
}

#[tokio::test]
async fn test_transient_statuses_are_retried() {
    let (danbooru, gelbooru) = servers().await;
    Mock::given(method("GET"))
        .and(path("/posts.json"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&danbooru)
        .await;
    Mock::given(method("GET"))
        .and(path("/posts.json"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(DANBOORU_LISTING, "application/json"))
        .expect(1)
        .mount(&danbooru)
        .await;

    let booru = Booru::new(&test_config(&danbooru, &gelbooru)).expect("Failed to build booru");
    let posts = booru
        .query_by_tags(Upstream::Danbooru, "sakura_kyouko", 0, 2)
        .await
        .expect("query should succeed after retries");
    assert_eq!(posts.len(), 2);
}

#[tokio::test]
async fn test_retries_give_up_after_max_attempts() {
    let (danbooru, gelbooru) = servers().await;
    Mock::given(method("GET"))
        .and(path("/posts.json"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&danbooru)
        .await;

    let booru = Booru::new(&test_config(&danbooru, &gelbooru)).expect("Failed to build booru");
    let err = booru
        .query_by_tags(Upstream::Danbooru, "sakura_kyouko", 0, 2)
        .await
        .unwrap_err();

    match err {
        AppError::RetriesExhausted { url, status, attempts } => {
            assert!(url.starts_with(&danbooru.uri()));
            assert_eq!(status, 429);
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_fatal_status_is_reported_without_retry() {
    let (danbooru, gelbooru) = servers().await;
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&gelbooru)
        .await;

    let booru = Booru::new(&test_config(&danbooru, &gelbooru)).expect("Failed to build booru");
    let err = booru
        .query_by_tags(Upstream::Gelbooru, "anything", 0, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Status { status: 403, .. }));
}
