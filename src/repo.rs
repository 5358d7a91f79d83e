use async_trait::async_trait;

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")]
    NotFound,
    #[error("conflict")]
    Conflict,
    #[error("internal: {0}")]
    Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Relational collaborator for the post tables. Writes are single-row (or
/// single-batch) operations with no cross-call transaction; the service layer
/// runs its own compensation when a later write fails.
#[async_trait]
pub trait PostRepo: Send + Sync {
    async fn insert_post(&self, post: Post) -> RepoResult<Post>;
    async fn insert_media(&self, media: MediaAttachment) -> RepoResult<MediaAttachment>;
    async fn insert_poll(&self, poll: Poll) -> RepoResult<Poll>;
    async fn insert_poll_options(&self, options: Vec<PollOption>) -> RepoResult<()>;

    /// Owner-filtered read joined with attachment URLs. Returns `Ok(None)`
    /// both when the post is absent and when it belongs to someone else.
    async fn find_post_with_media(
        &self,
        post_id: &str,
        author_id: &str,
    ) -> RepoResult<Option<PostWithMedia>>;

    /// Owner-filtered delete; dependents cascade. Deleting zero rows is not
    /// an error.
    async fn delete_post(&self, post_id: &str, author_id: &str) -> RepoResult<()>;

    /// Used when a post delete cannot be relied on to cascade the poll row.
    async fn delete_poll(&self, poll_id: &str) -> RepoResult<()>;

    async fn list_posts(&self, group_id: &str) -> RepoResult<Vec<Post>>;
    async fn get_post(&self, post_id: &str) -> RepoResult<Post>;
}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, RwLock};

    #[derive(Default)]
    struct State {
        posts: HashMap<Id, Post>,
        media: HashMap<Id, MediaAttachment>,
        polls: HashMap<Id, Poll>,
        options: HashMap<Id, PollOption>,
    }

    /// In-memory backend for tests and local development. Emulates the
    /// referential cascade the relational store provides: deleting a post
    /// removes its media, poll, and option rows.
    #[derive(Clone, Default)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
    }

    impl InMemRepo {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn post_count(&self) -> usize {
            self.state.read().unwrap().posts.len()
        }
        pub fn media_count(&self) -> usize {
            self.state.read().unwrap().media.len()
        }
        pub fn poll_count(&self) -> usize {
            self.state.read().unwrap().polls.len()
        }
        pub fn option_count(&self) -> usize {
            self.state.read().unwrap().options.len()
        }

        pub fn media_for_post(&self, post_id: &str) -> Vec<MediaAttachment> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s
                .media
                .values()
                .filter(|m| m.post_id == post_id)
                .cloned()
                .collect();
            v.sort_by_key(|m| m.media_order);
            v
        }

        pub fn poll_for_post(&self, post_id: &str) -> Option<Poll> {
            let s = self.state.read().unwrap();
            s.polls.values().find(|p| p.post_id == post_id).cloned()
        }

        pub fn options_for_poll(&self, poll_id: &str) -> Vec<PollOption> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s
                .options
                .values()
                .filter(|o| o.poll_id == poll_id)
                .cloned()
                .collect();
            v.sort_by_key(|o| o.option_order);
            v
        }
    }

    #[async_trait]
    impl PostRepo for InMemRepo {
        async fn insert_post(&self, post: Post) -> RepoResult<Post> {
            let mut s = self.state.write().unwrap();
            if s.posts.contains_key(&post.id) {
                return Err(RepoError::Conflict);
            }
            s.posts.insert(post.id.clone(), post.clone());
            Ok(post)
        }

        async fn insert_media(&self, media: MediaAttachment) -> RepoResult<MediaAttachment> {
            let mut s = self.state.write().unwrap();
            if s.media.contains_key(&media.id) {
                return Err(RepoError::Conflict);
            }
            if !s.posts.contains_key(&media.post_id) {
                return Err(RepoError::NotFound);
            }
            s.media.insert(media.id.clone(), media.clone());
            Ok(media)
        }

        async fn insert_poll(&self, poll: Poll) -> RepoResult<Poll> {
            let mut s = self.state.write().unwrap();
            if s.polls.contains_key(&poll.id) {
                return Err(RepoError::Conflict);
            }
            if !s.posts.contains_key(&poll.post_id) {
                return Err(RepoError::NotFound);
            }
            s.polls.insert(poll.id.clone(), poll.clone());
            Ok(poll)
        }

        async fn insert_poll_options(&self, options: Vec<PollOption>) -> RepoResult<()> {
            let mut s = self.state.write().unwrap();
            for opt in &options {
                if s.options.contains_key(&opt.id) {
                    return Err(RepoError::Conflict);
                }
                if !s.polls.contains_key(&opt.poll_id) {
                    return Err(RepoError::NotFound);
                }
            }
            for opt in options {
                s.options.insert(opt.id.clone(), opt);
            }
            Ok(())
        }

        async fn find_post_with_media(
            &self,
            post_id: &str,
            author_id: &str,
        ) -> RepoResult<Option<PostWithMedia>> {
            let s = self.state.read().unwrap();
            let post = match s.posts.get(post_id) {
                Some(p) if p.author_id == author_id => p.clone(),
                _ => return Ok(None),
            };
            let mut media: Vec<_> = s
                .media
                .values()
                .filter(|m| m.post_id == post_id)
                .cloned()
                .collect();
            media.sort_by_key(|m| m.media_order);
            let media_urls = media.into_iter().map(|m| m.media_url).collect();
            Ok(Some(PostWithMedia { post, media_urls }))
        }

        async fn delete_post(&self, post_id: &str, author_id: &str) -> RepoResult<()> {
            let mut s = self.state.write().unwrap();
            let owned = matches!(s.posts.get(post_id), Some(p) if p.author_id == author_id);
            if !owned {
                return Ok(());
            }
            s.posts.remove(post_id);
            s.media.retain(|_, m| m.post_id != post_id);
            let poll_ids: Vec<Id> = s
                .polls
                .values()
                .filter(|p| p.post_id == post_id)
                .map(|p| p.id.clone())
                .collect();
            s.polls.retain(|_, p| p.post_id != post_id);
            s.options.retain(|_, o| !poll_ids.contains(&o.poll_id));
            Ok(())
        }

        async fn delete_poll(&self, poll_id: &str) -> RepoResult<()> {
            let mut s = self.state.write().unwrap();
            s.polls.remove(poll_id);
            s.options.retain(|_, o| o.poll_id != poll_id);
            Ok(())
        }

        async fn list_posts(&self, group_id: &str) -> RepoResult<Vec<Post>> {
            let s = self.state.read().unwrap();
            let mut v: Vec<_> = s
                .posts
                .values()
                .filter(|p| p.group_id == group_id)
                .cloned()
                .collect();
            v.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(v)
        }

        async fn get_post(&self, post_id: &str) -> RepoResult<Post> {
            let s = self.state.read().unwrap();
            s.posts.get(post_id).cloned().ok_or(RepoError::NotFound)
        }
    }
}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use sqlx::{Pool, Postgres};

    #[derive(Clone)]
    pub struct PgRepo {
        pool: Pool<Postgres>,
    }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self {
            Self { pool }
        }
    }

    fn map_err(e: sqlx::Error) -> RepoError {
        match &e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(db)
                if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
            {
                RepoError::Conflict
            }
            _ => RepoError::Internal(e.to_string()),
        }
    }

    const POST_COLUMNS: &str =
        "id, title, description, image, kind, link_url, group_id, author_id, nsfw, spoiler, created_at";

    #[async_trait]
    impl PostRepo for PgRepo {
        async fn insert_post(&self, post: Post) -> RepoResult<Post> {
            let sql = format!(
                "INSERT INTO posts ({POST_COLUMNS}) \
                 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11) RETURNING {POST_COLUMNS}"
            );
            sqlx::query_as::<_, Post>(&sql)
                .bind(&post.id)
                .bind(&post.title)
                .bind(&post.description)
                .bind(&post.image)
                .bind(post.kind)
                .bind(&post.link_url)
                .bind(&post.group_id)
                .bind(&post.author_id)
                .bind(post.nsfw)
                .bind(post.spoiler)
                .bind(post.created_at)
                .fetch_one(&self.pool)
                .await
                .map_err(map_err)
        }

        async fn insert_media(&self, media: MediaAttachment) -> RepoResult<MediaAttachment> {
            sqlx::query_as::<_, MediaAttachment>(
                "INSERT INTO post_media (id, post_id, kind, media_url, media_order, created_at) \
                 VALUES ($1,$2,$3,$4,$5,$6) \
                 RETURNING id, post_id, kind, media_url, media_order, created_at",
            )
            .bind(&media.id)
            .bind(&media.post_id)
            .bind(media.kind)
            .bind(&media.media_url)
            .bind(media.media_order)
            .bind(media.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)
        }

        async fn insert_poll(&self, poll: Poll) -> RepoResult<Poll> {
            sqlx::query_as::<_, Poll>(
                "INSERT INTO post_polls (id, post_id, allows_multiple, ends_at, created_at) \
                 VALUES ($1,$2,$3,$4,$5) \
                 RETURNING id, post_id, allows_multiple, ends_at, created_at",
            )
            .bind(&poll.id)
            .bind(&poll.post_id)
            .bind(poll.allows_multiple)
            .bind(poll.ends_at)
            .bind(poll.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_err)
        }

        async fn insert_poll_options(&self, options: Vec<PollOption>) -> RepoResult<()> {
            let mut tx = self.pool.begin().await.map_err(map_err)?;
            for opt in &options {
                sqlx::query(
                    "INSERT INTO post_poll_options (id, poll_id, text, option_order, created_at) \
                     VALUES ($1,$2,$3,$4,$5)",
                )
                .bind(&opt.id)
                .bind(&opt.poll_id)
                .bind(&opt.text)
                .bind(opt.option_order)
                .bind(opt.created_at)
                .execute(&mut *tx)
                .await
                .map_err(map_err)?;
            }
            tx.commit().await.map_err(map_err)
        }

        async fn find_post_with_media(
            &self,
            post_id: &str,
            author_id: &str,
        ) -> RepoResult<Option<PostWithMedia>> {
            let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1 AND author_id = $2");
            let post = sqlx::query_as::<_, Post>(&sql)
                .bind(post_id)
                .bind(author_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_err)?;
            let Some(post) = post else { return Ok(None) };
            let media_urls: Vec<String> = sqlx::query_scalar(
                "SELECT media_url FROM post_media WHERE post_id = $1 ORDER BY media_order",
            )
            .bind(post_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)?;
            Ok(Some(PostWithMedia { post, media_urls }))
        }

        async fn delete_post(&self, post_id: &str, author_id: &str) -> RepoResult<()> {
            // Dependent rows cascade via the post_id foreign keys.
            sqlx::query("DELETE FROM posts WHERE id = $1 AND author_id = $2")
                .bind(post_id)
                .bind(author_id)
                .execute(&self.pool)
                .await
                .map_err(map_err)?;
            Ok(())
        }

        async fn delete_poll(&self, poll_id: &str) -> RepoResult<()> {
            sqlx::query("DELETE FROM post_polls WHERE id = $1")
                .bind(poll_id)
                .execute(&self.pool)
                .await
                .map_err(map_err)?;
            Ok(())
        }

        async fn list_posts(&self, group_id: &str) -> RepoResult<Vec<Post>> {
            let sql = format!(
                "SELECT {POST_COLUMNS} FROM posts WHERE group_id = $1 ORDER BY created_at DESC"
            );
            sqlx::query_as::<_, Post>(&sql)
                .bind(group_id)
                .fetch_all(&self.pool)
                .await
                .map_err(map_err)
        }

        async fn get_post(&self, post_id: &str) -> RepoResult<Post> {
            let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
            sqlx::query_as::<_, Post>(&sql)
                .bind(post_id)
                .fetch_one(&self.pool)
                .await
                .map_err(map_err)
        }
    }
}
