#![cfg(feature = "inmem-store")]

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use grove::models::*;
use grove::repo::{inmem::InMemRepo, PostRepo, RepoError, RepoResult};
use grove::storage::{ObjectStore, StorageError};
use grove::{PostError, PostService, StorageConfig};

// ---------------- Test collaborators ----------------

/// Object store that accepts everything; creation never touches storage.
struct NullStore;

#[async_trait::async_trait]
impl ObjectStore for NullStore {
    async fn remove_objects(&self, _bucket: &str, _paths: &[String]) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Wraps the in-memory repo and fails one configured forward operation, so
/// tests can observe the rollback the service runs around a mid-sequence
/// failure. With `undo_fails` set the compensating deletes error too.
#[derive(Clone, Copy, PartialEq)]
enum FailOn {
    InsertMedia,
    InsertPoll,
    InsertPollOptions,
}

struct FailingRepo {
    inner: InMemRepo,
    fail_on: FailOn,
    undo_fails: bool,
}

fn injected() -> RepoError {
    RepoError::Internal("injected failure".into())
}

#[async_trait::async_trait]
impl PostRepo for FailingRepo {
    async fn insert_post(&self, post: Post) -> RepoResult<Post> {
        self.inner.insert_post(post).await
    }
    async fn insert_media(&self, media: MediaAttachment) -> RepoResult<MediaAttachment> {
        if self.fail_on == FailOn::InsertMedia {
            return Err(injected());
        }
        self.inner.insert_media(media).await
    }
    async fn insert_poll(&self, poll: Poll) -> RepoResult<Poll> {
        if self.fail_on == FailOn::InsertPoll {
            return Err(injected());
        }
        self.inner.insert_poll(poll).await
    }
    async fn insert_poll_options(&self, options: Vec<PollOption>) -> RepoResult<()> {
        if self.fail_on == FailOn::InsertPollOptions {
            return Err(injected());
        }
        self.inner.insert_poll_options(options).await
    }
    async fn find_post_with_media(
        &self,
        post_id: &str,
        author_id: &str,
    ) -> RepoResult<Option<PostWithMedia>> {
        self.inner.find_post_with_media(post_id, author_id).await
    }
    async fn delete_post(&self, post_id: &str, author_id: &str) -> RepoResult<()> {
        if self.undo_fails {
            return Err(RepoError::Internal("undo rejected".into()));
        }
        self.inner.delete_post(post_id, author_id).await
    }
    async fn delete_poll(&self, poll_id: &str) -> RepoResult<()> {
        if self.undo_fails {
            return Err(RepoError::Internal("undo rejected".into()));
        }
        self.inner.delete_poll(poll_id).await
    }
    async fn list_posts(&self, group_id: &str) -> RepoResult<Vec<Post>> {
        self.inner.list_posts(group_id).await
    }
    async fn get_post(&self, post_id: &str) -> RepoResult<Post> {
        self.inner.get_post(post_id).await
    }
}

fn service(repo: Arc<dyn PostRepo>) -> PostService {
    PostService::new(repo, Arc::new(NullStore), StorageConfig::new("post-media"))
}

/// Minimal valid text-post request; tests adjust the fields they exercise.
fn request() -> NewPost {
    NewPost {
        title: "hello".into(),
        description: None,
        image: None,
        link_url: None,
        kind: None,
        nsfw: false,
        spoiler: false,
        media_url: None,
        poll: None,
        group_id: "g1".into(),
        author_id: "u1".into(),
        created_at: None,
        id: None,
    }
}

// ---------------- Creation happy paths ----------------

#[tokio::test]
async fn text_post_creates_exactly_one_row() {
    let repo = InMemRepo::new();
    let svc = service(Arc::new(repo.clone()));

    let post = svc.create_post(request()).await.unwrap();
    assert_eq!(post.kind, PostKind::Text);
    assert_eq!(post.group_id, "g1");
    assert!(post.id.starts_with("post_"));

    assert_eq!(repo.post_count(), 1);
    assert_eq!(repo.media_count(), 0);
    assert_eq!(repo.poll_count(), 0);
    assert_eq!(repo.option_count(), 0);
}

#[tokio::test]
async fn photo_post_attaches_media_with_order_zero() {
    let repo = InMemRepo::new();
    let svc = service(Arc::new(repo.clone()));

    let mut req = request();
    req.kind = Some(PostKind::Photo);
    req.media_url = Some("https://cdn.example.com/a.jpg".into());
    let post = svc.create_post(req).await.unwrap();

    assert_eq!(repo.post_count(), 1);
    let media = repo.media_for_post(&post.id);
    assert_eq!(media.len(), 1);
    assert_eq!(media[0].media_order, 0);
    assert_eq!(media[0].kind, MediaKind::Photo);
    assert_eq!(media[0].media_url, "https://cdn.example.com/a.jpg");
}

#[tokio::test]
async fn video_post_attaches_video_media() {
    let repo = InMemRepo::new();
    let svc = service(Arc::new(repo.clone()));

    let mut req = request();
    req.kind = Some(PostKind::Video);
    req.media_url = Some("https://cdn.example.com/a.mp4".into());
    let post = svc.create_post(req).await.unwrap();

    let media = repo.media_for_post(&post.id);
    assert_eq!(media.len(), 1);
    assert_eq!(media[0].kind, MediaKind::Video);
}

#[tokio::test]
async fn media_url_on_text_post_is_ignored() {
    let repo = InMemRepo::new();
    let svc = service(Arc::new(repo.clone()));

    let mut req = request();
    req.media_url = Some("https://cdn.example.com/a.jpg".into());
    svc.create_post(req).await.unwrap();

    assert_eq!(repo.post_count(), 1);
    assert_eq!(repo.media_count(), 0);
}

#[tokio::test]
async fn photo_post_without_media_url_creates_no_attachment() {
    let repo = InMemRepo::new();
    let svc = service(Arc::new(repo.clone()));

    let mut req = request();
    req.kind = Some(PostKind::Photo);
    svc.create_post(req).await.unwrap();

    assert_eq!(repo.post_count(), 1);
    assert_eq!(repo.media_count(), 0);
}

#[tokio::test]
async fn poll_options_are_trimmed_ordered_and_expiry_computed() {
    let repo = InMemRepo::new();
    let svc = service(Arc::new(repo.clone()));

    let mut req = request();
    req.kind = Some(PostKind::Poll);
    req.poll = Some(NewPoll {
        options: vec!["  A ".into(), "B".into(), "".into(), "C".into()],
        duration_hours: 24,
        allows_multiple: false,
    });
    let post = svc.create_post(req).await.unwrap();

    let poll = repo.poll_for_post(&post.id).expect("poll row");
    assert_eq!(poll.ends_at - post.created_at, Duration::hours(24));
    assert!(!poll.allows_multiple);

    let options = repo.options_for_poll(&poll.id);
    let texts: Vec<&str> = options.iter().map(|o| o.text.as_str()).collect();
    let orders: Vec<i32> = options.iter().map(|o| o.option_order).collect();
    assert_eq!(texts, ["A", "B", "C"]);
    assert_eq!(orders, [0, 1, 2]);
}

#[tokio::test]
async fn poll_kind_without_spec_persists_plain_post() {
    let repo = InMemRepo::new();
    let svc = service(Arc::new(repo.clone()));

    let mut req = request();
    req.kind = Some(PostKind::Poll);
    svc.create_post(req).await.unwrap();

    assert_eq!(repo.post_count(), 1);
    assert_eq!(repo.poll_count(), 0);
}

#[tokio::test]
async fn caller_supplied_id_and_timestamp_are_used_verbatim() {
    let repo = InMemRepo::new();
    let svc = service(Arc::new(repo.clone()));

    let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let mut req = request();
    req.id = Some("post_fixed".into());
    req.created_at = Some(ts);
    let post = svc.create_post(req).await.unwrap();

    assert_eq!(post.id, "post_fixed");
    assert_eq!(post.created_at, ts);
}

// ---------------- Validation and rollback ----------------

#[tokio::test]
async fn poll_with_fewer_than_two_clean_options_rolls_back_everything() {
    let repo = InMemRepo::new();
    let svc = service(Arc::new(repo.clone()));

    let mut req = request();
    req.kind = Some(PostKind::Poll);
    req.poll = Some(NewPoll {
        options: vec!["  ".into(), "".into(), "only".into()],
        duration_hours: 24,
        allows_multiple: false,
    });
    let err = svc.create_post(req).await.unwrap_err();
    match err {
        PostError::Validation(msg) => assert!(msg.contains("at least two options")),
        other => panic!("expected validation error, got {other:?}"),
    }

    assert_eq!(repo.post_count(), 0);
    assert_eq!(repo.poll_count(), 0);
    assert_eq!(repo.option_count(), 0);
}

#[tokio::test]
async fn nonpositive_poll_duration_rolls_back() {
    let repo = InMemRepo::new();
    let svc = service(Arc::new(repo.clone()));

    let mut req = request();
    req.kind = Some(PostKind::Poll);
    req.poll = Some(NewPoll {
        options: vec!["yes".into(), "no".into()],
        duration_hours: 0,
        allows_multiple: false,
    });
    let err = svc.create_post(req).await.unwrap_err();
    assert!(matches!(err, PostError::Validation(_)));
    assert_eq!(repo.post_count(), 0);
}

#[tokio::test]
async fn failed_media_insert_leaves_zero_posts() {
    let inner = InMemRepo::new();
    let svc = service(Arc::new(FailingRepo {
        inner: inner.clone(),
        fail_on: FailOn::InsertMedia,
        undo_fails: false,
    }));

    let mut req = request();
    req.kind = Some(PostKind::Photo);
    req.media_url = Some("https://cdn.example.com/a.jpg".into());
    let err = svc.create_post(req).await.unwrap_err();
    assert!(matches!(err, PostError::Repo(RepoError::Internal(_))));

    assert_eq!(inner.post_count(), 0);
    assert_eq!(inner.media_count(), 0);
}

#[tokio::test]
async fn failed_poll_insert_leaves_zero_posts() {
    let inner = InMemRepo::new();
    let svc = service(Arc::new(FailingRepo {
        inner: inner.clone(),
        fail_on: FailOn::InsertPoll,
        undo_fails: false,
    }));

    let mut req = request();
    req.kind = Some(PostKind::Poll);
    req.poll = Some(NewPoll {
        options: vec!["yes".into(), "no".into()],
        duration_hours: 1,
        allows_multiple: false,
    });
    svc.create_post(req).await.unwrap_err();

    assert_eq!(inner.post_count(), 0);
    assert_eq!(inner.poll_count(), 0);
}

#[tokio::test]
async fn failed_option_batch_unwinds_poll_then_post() {
    let inner = InMemRepo::new();
    let svc = service(Arc::new(FailingRepo {
        inner: inner.clone(),
        fail_on: FailOn::InsertPollOptions,
        undo_fails: false,
    }));

    let mut req = request();
    req.kind = Some(PostKind::Poll);
    req.poll = Some(NewPoll {
        options: vec!["yes".into(), "no".into(), "maybe".into()],
        duration_hours: 48,
        allows_multiple: true,
    });
    svc.create_post(req).await.unwrap_err();

    assert_eq!(inner.post_count(), 0);
    assert_eq!(inner.poll_count(), 0);
    assert_eq!(inner.option_count(), 0);
}

#[tokio::test]
async fn failed_compensation_is_swallowed_and_original_error_surfaces() {
    let inner = InMemRepo::new();
    let svc = service(Arc::new(FailingRepo {
        inner: inner.clone(),
        fail_on: FailOn::InsertPollOptions,
        undo_fails: true,
    }));

    let mut req = request();
    req.kind = Some(PostKind::Poll);
    req.poll = Some(NewPoll {
        options: vec!["yes".into(), "no".into()],
        duration_hours: 24,
        allows_multiple: false,
    });
    let err = svc.create_post(req).await.unwrap_err();

    // The undo deletes errored too; the caller still gets the failure that
    // stopped the forward sequence, not the cleanup's.
    match err {
        PostError::Repo(RepoError::Internal(msg)) => assert_eq!(msg, "injected failure"),
        other => panic!("expected the original insert failure, got {other:?}"),
    }
    // Rollback could not complete, so the earlier rows remain for manual
    // cleanup.
    assert_eq!(inner.post_count(), 1);
    assert_eq!(inner.poll_count(), 1);
    assert_eq!(inner.option_count(), 0);
}

#[tokio::test]
async fn duplicate_post_id_surfaces_conflict() {
    let repo = InMemRepo::new();
    let svc = service(Arc::new(repo.clone()));

    let mut req = request();
    req.id = Some("post_dup".into());
    svc.create_post(req.clone()).await.unwrap();
    let err = svc.create_post(req).await.unwrap_err();
    assert!(matches!(err, PostError::Repo(RepoError::Conflict)));
    assert_eq!(repo.post_count(), 1);
}

// ---------------- Pass-through reads ----------------

#[tokio::test]
async fn list_posts_returns_group_posts_newest_first() {
    let repo = InMemRepo::new();
    let svc = service(Arc::new(repo.clone()));

    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    for (i, title) in ["old", "new"].iter().enumerate() {
        let mut req = request();
        req.title = title.to_string();
        req.created_at = Some(t0 + Duration::hours(i as i64));
        svc.create_post(req).await.unwrap();
    }
    let mut other = request();
    other.group_id = "g2".into();
    svc.create_post(other).await.unwrap();

    let posts = svc.list_posts("g1").await.unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].title, "new");
    assert_eq!(posts[1].title, "old");
}
