use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use futures_util::future::BoxFuture;
use tracing::warn;

use crate::error::{DeleteFailure, PostError};
use crate::ids::new_id;
use crate::models::*;
use crate::repo::{PostRepo, RepoError, RepoResult};
use crate::resolve::{collect_object_refs, StorageConfig};
use crate::storage::ObjectStore;

type Undo = Box<dyn FnOnce() -> BoxFuture<'static, RepoResult<()>> + Send>;

/// Reverse-order compensation stack for a multi-row write with no spanning
/// transaction. Each committed forward step pushes its undo; when a later
/// step fails the stack unwinds newest-first. Undo failures are logged and
/// swallowed so the original failure is what the caller sees.
struct Saga {
    op: &'static str,
    undo: Vec<(&'static str, Undo)>,
}

impl Saga {
    fn new(op: &'static str) -> Self {
        Self {
            op,
            undo: Vec::new(),
        }
    }

    fn push(&mut self, step: &'static str, undo: Undo) {
        self.undo.push((step, undo));
    }

    async fn unwind(self) {
        let Saga { op, undo } = self;
        for (step, undo) in undo.into_iter().rev() {
            if let Err(e) = undo().await {
                // Left for manual cleanup; the caller gets the original error.
                warn!("compensation failed op={op} step={step} err={e}");
            }
        }
    }
}

/// Outcome of a successful deletion. `storage_warning` is set when blob
/// cleanup partially failed or some media reference could not be resolved;
/// the post row itself is gone either way.
#[derive(Debug)]
pub struct DeletionReport {
    pub storage_warning: Option<String>,
}

pub struct PostService {
    repo: Arc<dyn PostRepo>,
    store: Arc<dyn ObjectStore>,
    storage: StorageConfig,
}

impl PostService {
    pub fn new(repo: Arc<dyn PostRepo>, store: Arc<dyn ObjectStore>, storage: StorageConfig) -> Self {
        Self { repo, store, storage }
    }

    /// Creates a post and its dependent rows (one media attachment, or a poll
    /// with its options) as a strict left-to-right commit sequence. Any
    /// failure past the root insert rolls back everything written so far and
    /// returns the original failure; the caller never sees partial state.
    pub async fn create_post(&self, new: NewPost) -> Result<Post, PostError> {
        let kind = new.kind.unwrap_or(PostKind::Text);
        let now = new.created_at.unwrap_or_else(Utc::now);
        let post = Post {
            id: new.id.unwrap_or_else(|| new_id("post")),
            title: new.title,
            description: new.description,
            image: new.image,
            kind,
            link_url: new.link_url,
            group_id: new.group_id,
            author_id: new.author_id,
            nsfw: new.nsfw,
            spoiler: new.spoiler,
            created_at: now,
        };

        // Root insert first; a failure here has nothing to compensate.
        let post = self.repo.insert_post(post).await?;

        let mut saga = Saga::new("create_post");
        saga.push("post", {
            let repo = Arc::clone(&self.repo);
            let post_id = post.id.clone();
            let author_id = post.author_id.clone();
            Box::new(move || {
                Box::pin(async move { repo.delete_post(&post_id, &author_id).await })
            })
        });

        if let (Some(media_kind), Some(media_url)) = (kind.media_kind(), new.media_url) {
            let media = MediaAttachment {
                id: new_id("media"),
                post_id: post.id.clone(),
                kind: media_kind,
                media_url,
                media_order: 0,
                created_at: now,
            };
            if let Err(e) = self.repo.insert_media(media).await {
                saga.unwind().await;
                return Err(e.into());
            }
        }

        if kind == PostKind::Poll {
            if let Some(spec) = new.poll {
                let cleaned: Vec<String> = spec
                    .options
                    .iter()
                    .map(|o| o.trim())
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect();
                if cleaned.len() < 2 {
                    saga.unwind().await;
                    return Err(PostError::Validation(
                        "a poll needs at least two options".into(),
                    ));
                }
                if spec.duration_hours <= 0 {
                    saga.unwind().await;
                    return Err(PostError::Validation("poll duration must be positive".into()));
                }

                let poll = Poll {
                    id: new_id("poll"),
                    post_id: post.id.clone(),
                    allows_multiple: spec.allows_multiple,
                    ends_at: now + Duration::hours(spec.duration_hours),
                    created_at: now,
                };
                let poll = match self.repo.insert_poll(poll).await {
                    Ok(p) => p,
                    Err(e) => {
                        saga.unwind().await;
                        return Err(e.into());
                    }
                };
                // Explicit poll undo: not every relational backend cascades
                // post_polls off the post row.
                saga.push("poll", {
                    let repo = Arc::clone(&self.repo);
                    let poll_id = poll.id.clone();
                    Box::new(move || Box::pin(async move { repo.delete_poll(&poll_id).await }))
                });

                let options: Vec<PollOption> = cleaned
                    .into_iter()
                    .enumerate()
                    .map(|(i, text)| PollOption {
                        id: new_id("opt"),
                        poll_id: poll.id.clone(),
                        text,
                        option_order: i as i32,
                        created_at: now,
                    })
                    .collect();
                if let Err(e) = self.repo.insert_poll_options(options).await {
                    saga.unwind().await;
                    return Err(e.into());
                }
            }
        }

        Ok(post)
    }

    /// Deletes a post owned by `author_id` together with its stored media
    /// blobs. Blob cleanup is best-effort relative to the row delete: the
    /// post disappearing is the primary guarantee, orphaned blobs are a
    /// reported, recoverable condition.
    pub async fn delete_post(
        &self,
        post_id: &str,
        author_id: &str,
    ) -> Result<DeletionReport, DeleteFailure> {
        let found = self
            .repo
            .find_post_with_media(post_id, author_id)
            .await
            .map_err(|e| DeleteFailure {
                source: e.into(),
                storage_warning: None,
            })?;
        let Some(found) = found else {
            return Err(DeleteFailure {
                source: PostError::NotFound,
                storage_warning: None,
            });
        };

        let mut refs: BTreeSet<String> = BTreeSet::new();
        if let Some(image) = &found.post.image {
            if !image.is_empty() {
                refs.insert(image.clone());
            }
        }
        for url in &found.media_urls {
            if !url.is_empty() {
                refs.insert(url.clone());
            }
        }

        let groups = collect_object_refs(&self.storage, refs.iter().map(String::as_str));

        let mut storage_warning: Option<String> = None;
        for (bucket, paths) in &groups.by_bucket {
            if paths.is_empty() {
                continue;
            }
            let paths: Vec<String> = paths.iter().cloned().collect();
            if let Err(e) = self.store.remove_objects(bucket, &paths).await {
                warn!("storage cleanup failed post={post_id} bucket={bucket} err={e}");
                // Last failure wins the warning slot; deliberately not a
                // multi-error aggregation.
                storage_warning =
                    Some(format!("failed to remove media from bucket '{bucket}': {e}"));
            }
        }
        if storage_warning.is_none() && !groups.unresolved.is_empty() {
            storage_warning = Some(format!(
                "could not resolve the storage path of {} file(s)",
                groups.unresolved.len()
            ));
        }

        if let Err(e) = self.repo.delete_post(post_id, author_id).await {
            return Err(DeleteFailure {
                source: e.into(),
                storage_warning,
            });
        }
        Ok(DeletionReport { storage_warning })
    }

    /// Straight pass-through read, newest first.
    pub async fn list_posts(&self, group_id: &str) -> Result<Vec<Post>, PostError> {
        Ok(self.repo.list_posts(group_id).await?)
    }

    pub async fn get_post(&self, post_id: &str) -> Result<Post, PostError> {
        self.repo.get_post(post_id).await.map_err(|e| match e {
            RepoError::NotFound => PostError::NotFound,
            other => other.into(),
        })
    }
}
