//! In-memory collaborators for exercising the pipeline without Postgres or
//! a real object store.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use inkpress::application::images::ImageUpload;
use inkpress::application::invalidation::{InvalidationQueue, InvalidationTarget};
use inkpress::application::pipeline::{PipelineDeps, PostPipeline};
use inkpress::application::queries::PostQueries;
use inkpress::application::render::{
    HighlighterRegistry, MarkdownRenderer, RenderError, RenderService,
};
use inkpress::application::repos::{
    CreatePostParams, CreateTagParams, PostChanges, PostsRepo, PostsWriteRepo, RepoError,
    SessionsRepo, TagWithCount, TagsRepo, TagsWriteRepo, UsersRepo,
};
use inkpress::application::session::{AuthenticatedUserId, Session};
use inkpress::application::storage::{BlobStore, BlobStoreError};
use inkpress::domain::entities::{PostRecord, SessionRecord, TagRecord, UserRecord};
use inkpress::domain::uploads::ImageBounds;

pub const CDN: &str = "https://cdn.example.com";

#[derive(Default)]
struct Tables {
    users: BTreeMap<Uuid, UserRecord>,
    sessions: BTreeMap<Uuid, SessionRecord>,
    posts: BTreeMap<Uuid, PostRecord>,
    tags: BTreeMap<Uuid, TagRecord>,
    clock: i64,
}

impl Tables {
    /// Strictly increasing timestamps so "newest first" is deterministic.
    fn tick(&mut self) -> OffsetDateTime {
        self.clock += 1;
        OffsetDateTime::UNIX_EPOCH + Duration::days(20_000) + Duration::seconds(self.clock)
    }

    fn slug_taken(&self, slug: &str, except: Option<Uuid>) -> bool {
        self.posts
            .values()
            .any(|post| post.slug == slug && Some(post.id) != except)
    }
}

/// Repository fake backing every repository trait.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    /// Upcoming `create_post` calls that lose their slug to a concurrent writer.
    slug_races: AtomicUsize,
    tag_creates: AtomicUsize,
    fail_updates: AtomicBool,
}

impl MemoryStore {
    pub fn add_user(&self, user_name: &str) -> UserRecord {
        let mut tables = self.tables.lock().unwrap();
        let user = UserRecord {
            id: Uuid::new_v4(),
            user_name: user_name.to_string(),
            normalized_user_name: user_name.to_uppercase(),
            created_at: tables.tick(),
        };
        tables.users.insert(user.id, user.clone());
        user
    }

    pub fn add_session(&self, user_id: Uuid, expires_at: OffsetDateTime) -> SessionRecord {
        let session = SessionRecord {
            id: Uuid::new_v4(),
            user_id,
            expires_at,
        };
        self.tables
            .lock()
            .unwrap()
            .sessions
            .insert(session.id, session.clone());
        session
    }

    pub fn inject_slug_races(&self, count: usize) {
        self.slug_races.store(count, Ordering::SeqCst);
    }

    pub fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }

    pub fn tag_creates(&self) -> usize {
        self.tag_creates.load(Ordering::SeqCst)
    }

    pub fn post_count(&self) -> usize {
        self.tables.lock().unwrap().posts.len()
    }

    pub fn post(&self, id: Uuid) -> Option<PostRecord> {
        self.tables.lock().unwrap().posts.get(&id).cloned()
    }

    pub fn tag_names(&self, ids: &[Uuid]) -> BTreeSet<String> {
        let tables = self.tables.lock().unwrap();
        ids.iter()
            .filter_map(|id| tables.tags.get(id).map(|tag| tag.name.clone()))
            .collect()
    }
}

fn sorted_newest_first(mut posts: Vec<PostRecord>) -> Vec<PostRecord> {
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    posts
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.posts.values().find(|post| post.slug == slug).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.tables.lock().unwrap().posts.get(&id).cloned())
    }

    async fn list_by_author(&self, author_id: Uuid) -> Result<Vec<PostRecord>, RepoError> {
        let tables = self.tables.lock().unwrap();
        Ok(sorted_newest_first(
            tables
                .posts
                .values()
                .filter(|post| post.author_id == author_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<PostRecord>, RepoError> {
        let tables = self.tables.lock().unwrap();
        let mut posts = sorted_newest_first(tables.posts.values().cloned().collect());
        posts.truncate(limit as usize);
        Ok(posts)
    }

    async fn list_by_tag(&self, tag_id: Uuid) -> Result<Vec<PostRecord>, RepoError> {
        let tables = self.tables.lock().unwrap();
        Ok(sorted_newest_first(
            tables
                .posts
                .values()
                .filter(|post| post.tag_ids.contains(&tag_id))
                .cloned()
                .collect(),
        ))
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let mut tables = self.tables.lock().unwrap();

        let raced = self
            .slug_races
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if raced {
            // Another writer lands a post on the same slug first.
            let now = tables.tick();
            let squatter = PostRecord {
                id: Uuid::new_v4(),
                slug: params.slug.clone(),
                title: "Concurrent post".to_string(),
                markdown_source: "concurrent".to_string(),
                rendered_html: "<p>concurrent</p>".to_string(),
                author_id: params.author_id,
                tag_ids: Vec::new(),
                cover_image_url: String::new(),
                created_at: now,
                updated_at: now,
            };
            tables.posts.insert(squatter.id, squatter);
        }

        if tables.slug_taken(&params.slug, None) {
            return Err(RepoError::Duplicate {
                constraint: "posts_slug_key".to_string(),
            });
        }

        let now = tables.tick();
        let mut tag_ids = params.tag_ids;
        tag_ids.sort();
        tag_ids.dedup();
        let post = PostRecord {
            id: Uuid::new_v4(),
            slug: params.slug,
            title: params.title,
            markdown_source: params.markdown_source,
            rendered_html: params.rendered_html,
            author_id: params.author_id,
            tag_ids,
            cover_image_url: params.cover_image_url,
            created_at: now,
            updated_at: now,
        };
        tables.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn update_post_partial(
        &self,
        id: Uuid,
        changes: PostChanges,
    ) -> Result<PostRecord, RepoError> {
        changes.check_body_pairing()?;
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }

        let mut tables = self.tables.lock().unwrap();
        if let Some(slug) = changes.slug.as_deref() {
            if tables.slug_taken(slug, Some(id)) {
                return Err(RepoError::Duplicate {
                    constraint: "posts_slug_key".to_string(),
                });
            }
        }

        let now = tables.tick();
        let post = tables.posts.get_mut(&id).ok_or(RepoError::NotFound)?;
        if let Some(slug) = changes.slug {
            post.slug = slug;
        }
        if let Some(title) = changes.title {
            post.title = title;
        }
        if let Some(markdown) = changes.markdown_source {
            post.markdown_source = markdown;
        }
        if let Some(html) = changes.rendered_html {
            post.rendered_html = html;
        }
        if let Some(mut tag_ids) = changes.tag_ids {
            tag_ids.sort();
            tag_ids.dedup();
            post.tag_ids = tag_ids;
        }
        if let Some(url) = changes.cover_image_url {
            post.cover_image_url = url;
        }
        post.updated_at = now;
        Ok(post.clone())
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        self.tables
            .lock()
            .unwrap()
            .posts
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl TagsRepo for MemoryStore {
    async fn find_by_normalized_name(&self, name: &str) -> Result<Option<TagRecord>, RepoError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.tags.values().find(|tag| tag.name == name).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<TagRecord>, RepoError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.tags.values().find(|tag| tag.slug == slug).cloned())
    }

    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<TagRecord>, RepoError> {
        let tables = self.tables.lock().unwrap();
        let Some(post) = tables.posts.get(&post_id) else {
            return Ok(Vec::new());
        };
        let mut tags: Vec<TagRecord> = post
            .tag_ids
            .iter()
            .filter_map(|id| tables.tags.get(id).cloned())
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn list_with_counts(&self) -> Result<Vec<TagWithCount>, RepoError> {
        let tables = self.tables.lock().unwrap();
        let mut counts: Vec<TagWithCount> = tables
            .tags
            .values()
            .map(|tag| TagWithCount {
                id: tag.id,
                slug: tag.slug.clone(),
                name: tag.name.clone(),
                count: tables
                    .posts
                    .values()
                    .filter(|post| post.tag_ids.contains(&tag.id))
                    .count() as u64,
            })
            .filter(|tag| tag.count > 0)
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        Ok(counts)
    }
}

#[async_trait]
impl TagsWriteRepo for MemoryStore {
    async fn create_tag(&self, params: CreateTagParams) -> Result<TagRecord, RepoError> {
        self.tag_creates.fetch_add(1, Ordering::SeqCst);
        let mut tables = self.tables.lock().unwrap();
        for tag in tables.tags.values() {
            let constraint = if tag.name == params.name {
                "tags_name_key"
            } else if tag.slug == params.slug {
                "tags_slug_key"
            } else {
                continue;
            };
            return Err(RepoError::Duplicate {
                constraint: constraint.to_string(),
            });
        }
        let tag = TagRecord {
            id: Uuid::new_v4(),
            name: params.name,
            slug: params.slug,
            created_at: tables.tick(),
        };
        tables.tags.insert(tag.id, tag.clone());
        Ok(tag)
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.tables.lock().unwrap().users.get(&id).cloned())
    }

    async fn find_by_normalized_name(&self, name: &str) -> Result<Option<UserRecord>, RepoError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .users
            .values()
            .find(|user| user.normalized_user_name == name)
            .cloned())
    }
}

#[async_trait]
impl SessionsRepo for MemoryStore {
    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, RepoError> {
        Ok(self.tables.lock().unwrap().sessions.get(&id).cloned())
    }
}

/// Blob store fake that records keys and can be told to fail.
#[derive(Default)]
pub struct RecordingBlobStore {
    pub puts: Mutex<Vec<String>>,
    pub deletes: Mutex<Vec<String>>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl RecordingBlobStore {
    pub fn fail_puts(&self) {
        self.fail_puts.store(true, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    pub fn put_keys(&self) -> Vec<String> {
        self.puts.lock().unwrap().clone()
    }

    pub fn deleted_keys(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStore for RecordingBlobStore {
    async fn put(&self, key: &str, _body: Bytes) -> Result<String, BlobStoreError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(BlobStoreError::Status { status: 500 });
        }
        self.puts.lock().unwrap().push(key.to_string());
        Ok(format!("{CDN}/{key}"))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobStoreError> {
        self.deletes.lock().unwrap().push(key.to_string());
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BlobStoreError::Status { status: 503 });
        }
        Ok(())
    }
}

/// Real renderer that counts its invocations.
pub struct CountingRenderer {
    inner: MarkdownRenderer,
    calls: AtomicUsize,
}

impl CountingRenderer {
    pub fn new() -> Self {
        let registry = HighlighterRegistry::bundled().expect("bundled syntaxes load");
        Self {
            inner: MarkdownRenderer::new(registry),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RenderService for CountingRenderer {
    fn render(&self, markdown: &str) -> Result<String, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.render(markdown)
    }
}

/// Minimal PNG header: signature plus an IHDR chunk carrying the dimensions.
pub fn png(width: u32, height: u32) -> Bytes {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    Bytes::from(bytes)
}

pub fn cover(width: u32, height: u32) -> ImageUpload {
    ImageUpload {
        file_name: "cover.png".to_string(),
        content_type: "image/png".to_string(),
        bytes: png(width, height),
    }
}

/// Storage key of a public URL handed out by [`RecordingBlobStore`].
pub fn key_of(url: &str) -> String {
    url.trim_start_matches(CDN).trim_start_matches('/').to_string()
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<RecordingBlobStore>,
    pub renderer: Arc<CountingRenderer>,
    pub invalidations: Arc<InvalidationQueue>,
    pub pipeline: PostPipeline,
    pub queries: PostQueries,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::default());
        let blobs = Arc::new(RecordingBlobStore::default());
        let renderer = Arc::new(CountingRenderer::new());
        let invalidations = Arc::new(InvalidationQueue::new());

        let pipeline = PostPipeline::new(PipelineDeps {
            posts: store.clone(),
            posts_writer: store.clone(),
            tags: store.clone(),
            tags_writer: store.clone(),
            blob_store: blobs.clone(),
            renderer: renderer.clone(),
            invalidation: invalidations.clone(),
            image_bounds: ImageBounds::default(),
        });
        let queries = PostQueries::new(store.clone(), store.clone(), store.clone());

        Self {
            store,
            blobs,
            renderer,
            invalidations,
            pipeline,
            queries,
        }
    }

    pub fn author(&self, user_name: &str) -> (UserRecord, Session) {
        let user = self.store.add_user(user_name);
        let session = Session::Authenticated(AuthenticatedUserId::new(user.id));
        (user, session)
    }

    pub fn drain_targets(&self) -> Vec<InvalidationTarget> {
        self.invalidations
            .drain(usize::MAX)
            .into_iter()
            .map(|event| event.target)
            .collect()
    }
}
