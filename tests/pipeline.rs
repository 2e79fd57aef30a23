mod support;

use inkpress::application::error::AppError;
use inkpress::application::invalidation::InvalidationTarget;
use inkpress::application::pipeline::{CreatePostCommand, EditPostCommand};
use inkpress::application::session::Session;
use inkpress::domain::entities::PostRecord;
use inkpress_api_types::FailureKind;

use support::{Harness, cover, key_of};

fn create_command(title: &str, markdown: &str, tags: &[&str]) -> CreatePostCommand {
    CreatePostCommand {
        title: title.to_string(),
        markdown: markdown.to_string(),
        tags: tags.iter().map(|tag| tag.to_string()).collect(),
        cover_image: cover(800, 600),
    }
}

fn edit_command(post: &PostRecord, title: &str, markdown: &str, tags: &[&str]) -> EditPostCommand {
    EditPostCommand {
        post_id: post.id,
        title: title.to_string(),
        markdown: markdown.to_string(),
        tags: tags.iter().map(|tag| tag.to_string()).collect(),
        cover_image: None,
    }
}

async fn publish(harness: &Harness, session: &Session) -> PostRecord {
    harness
        .pipeline
        .create_post(session, create_command("My First Post", "# Hello", &["AI", "ai "]))
        .await
        .expect("post created")
}

fn kind(err: &AppError) -> FailureKind {
    err.kind()
}

#[tokio::test]
async fn create_publishes_post_with_slug_tags_and_html() {
    let harness = Harness::new();
    let (author, session) = harness.author("alice");

    let post = publish(&harness, &session).await;

    assert_eq!(post.slug, "my-first-post");
    assert_eq!(post.title, "My First Post");
    assert_eq!(post.author_id, author.id);
    assert_eq!(post.tag_ids.len(), 1);
    assert_eq!(
        harness.store.tag_names(&post.tag_ids).into_iter().collect::<Vec<_>>(),
        vec!["ai".to_string()]
    );
    assert!(post.rendered_html.contains("<h1>Hello</h1>"));
    assert_eq!(post.markdown_source, "# Hello");

    let puts = harness.blobs.put_keys();
    assert_eq!(puts.len(), 1);
    assert_eq!(key_of(&post.cover_image_url), puts[0]);
    assert_eq!(harness.renderer.calls(), 1);

    assert_eq!(
        harness.drain_targets(),
        vec![
            InvalidationTarget::Home,
            InvalidationTarget::AuthorDashboard {
                author_id: author.id
            },
        ]
    );
}

#[tokio::test]
async fn colliding_titles_receive_numbered_slugs() {
    let harness = Harness::new();
    let (_, session) = harness.author("alice");

    let mut slugs = Vec::new();
    for _ in 0..3 {
        slugs.push(publish(&harness, &session).await.slug);
    }

    assert_eq!(slugs, ["my-first-post", "my-first-post-1", "my-first-post-2"]);
}

#[tokio::test]
async fn tag_names_sharing_a_slug_are_both_created() {
    let harness = Harness::new();
    let (_, session) = harness.author("alice");

    let c = harness
        .pipeline
        .create_post(&session, create_command("Pointers in C", "body", &["C"]))
        .await
        .expect("c post");
    let cpp = harness
        .pipeline
        .create_post(&session, create_command("Templates in C++", "body", &["C++"]))
        .await
        .expect("c++ post");

    assert!(harness.blobs.deleted_keys().is_empty());
    assert_ne!(c.tag_ids, cpp.tag_ids);

    let tagged = harness.queries.posts_by_tag("c-1").await.expect("by tag");
    let slugs: Vec<&str> = tagged.iter().map(|post| post.slug.as_str()).collect();
    assert_eq!(slugs, [cpp.slug.as_str()]);

    let post = harness
        .pipeline
        .create_post(
            &session,
            create_command("Server Side JS", "body", &["node.js", "node js"]),
        )
        .await
        .expect("node post");
    assert_eq!(post.tag_ids.len(), 2);
}

#[tokio::test]
async fn oversized_cover_fails_before_any_io() {
    let harness = Harness::new();
    let (_, session) = harness.author("alice");

    let mut command = create_command("My First Post", "# Hello", &["AI"]);
    command.cover_image = cover(1920, 1080);
    let err = harness
        .pipeline
        .create_post(&session, command)
        .await
        .expect_err("oversized cover");

    assert_eq!(kind(&err), FailureKind::Validation);
    assert!(harness.blobs.put_keys().is_empty());
    assert_eq!(harness.renderer.calls(), 0);
    assert_eq!(harness.store.tag_creates(), 0);
    assert_eq!(harness.store.post_count(), 0);
}

#[tokio::test]
async fn invalid_input_is_rejected_with_validation_errors() {
    let harness = Harness::new();
    let (_, session) = harness.author("alice");

    let cases = [
        create_command("Hi", "# Hello", &[]),
        create_command("My First Post", "   ", &[]),
        create_command("My First Post", "# Hello", &["a", "b", "c", "d", "e", "f"]),
    ];
    for command in cases {
        let err = harness
            .pipeline
            .create_post(&session, command)
            .await
            .expect_err("invalid input");
        assert_eq!(kind(&err), FailureKind::Validation);
    }

    assert_eq!(harness.store.tag_creates(), 0);
    assert!(harness.blobs.put_keys().is_empty());
}

#[tokio::test]
async fn anonymous_callers_cannot_mutate() {
    let harness = Harness::new();
    let (_, session) = harness.author("alice");
    let post = publish(&harness, &session).await;

    let err = harness
        .pipeline
        .create_post(&Session::Anonymous, create_command("Another Post", "# Hi", &[]))
        .await
        .expect_err("anonymous create");
    assert_eq!(kind(&err), FailureKind::Unauthorized);

    let err = harness
        .pipeline
        .delete_post(&Session::Anonymous, post.id)
        .await
        .expect_err("anonymous delete");
    assert_eq!(kind(&err), FailureKind::Unauthorized);
    assert!(harness.store.post(post.id).is_some());
}

#[tokio::test]
async fn upload_failure_aborts_create() {
    let harness = Harness::new();
    let (_, session) = harness.author("alice");
    harness.blobs.fail_puts();

    let err = harness
        .pipeline
        .create_post(&session, create_command("My First Post", "# Hello", &["AI"]))
        .await
        .expect_err("upload fails");

    assert_eq!(kind(&err), FailureKind::Upload);
    assert_eq!(err.public_message(), "Image upload failed");
    assert_eq!(harness.store.post_count(), 0);
    assert!(harness.drain_targets().is_empty());
}

#[tokio::test]
async fn slug_lost_to_concurrent_writer_is_reallocated() {
    let harness = Harness::new();
    let (_, session) = harness.author("alice");
    harness.store.inject_slug_races(1);

    let post = publish(&harness, &session).await;

    assert_eq!(post.slug, "my-first-post-1");
    assert!(harness.blobs.deleted_keys().is_empty());
}

#[tokio::test]
async fn exhausted_persist_attempts_remove_the_uploaded_blob() {
    let harness = Harness::new();
    let (_, session) = harness.author("alice");
    harness.store.inject_slug_races(3);

    let err = harness
        .pipeline
        .create_post(&session, create_command("My First Post", "# Hello", &[]))
        .await
        .expect_err("every attempt races");

    assert_eq!(kind(&err), FailureKind::Storage);
    let puts = harness.blobs.put_keys();
    assert_eq!(puts.len(), 1);
    assert_eq!(harness.blobs.deleted_keys(), puts);
}

#[tokio::test]
async fn title_only_edit_skips_render_tags_and_upload() {
    let harness = Harness::new();
    let (author, session) = harness.author("alice");
    let post = publish(&harness, &session).await;
    harness.drain_targets();

    let updated = harness
        .pipeline
        .edit_post(&session, edit_command(&post, "Renamed Post", "# Hello", &["ai"]))
        .await
        .expect("edit");

    assert_eq!(updated.title, "Renamed Post");
    assert_eq!(updated.slug, "renamed-post");
    assert_eq!(updated.rendered_html, post.rendered_html);
    assert_eq!(updated.tag_ids, post.tag_ids);
    assert_eq!(updated.cover_image_url, post.cover_image_url);

    assert_eq!(harness.renderer.calls(), 1);
    assert_eq!(harness.store.tag_creates(), 1);
    assert_eq!(harness.blobs.put_keys().len(), 1);

    assert_eq!(
        harness.drain_targets(),
        vec![
            InvalidationTarget::PostDetail {
                slug: "my-first-post".into()
            },
            InvalidationTarget::PostDetail {
                slug: "renamed-post".into()
            },
            InvalidationTarget::Home,
            InvalidationTarget::AuthorDashboard {
                author_id: author.id
            },
        ]
    );
}

#[tokio::test]
async fn body_edit_rerenders_and_keeps_slug() {
    let harness = Harness::new();
    let (_, session) = harness.author("alice");
    let post = publish(&harness, &session).await;

    let updated = harness
        .pipeline
        .edit_post(
            &session,
            edit_command(&post, "My First Post", "# Hello again", &["ai"]),
        )
        .await
        .expect("edit");

    assert_eq!(updated.slug, "my-first-post");
    assert!(updated.rendered_html.contains("<h1>Hello again</h1>"));
    assert_eq!(updated.markdown_source, "# Hello again");
    assert_eq!(harness.renderer.calls(), 2);
}

#[tokio::test]
async fn tag_edit_replaces_the_tag_set() {
    let harness = Harness::new();
    let (_, session) = harness.author("alice");
    let post = publish(&harness, &session).await;

    let updated = harness
        .pipeline
        .edit_post(
            &session,
            edit_command(&post, "My First Post", "# Hello", &["Rust", "async"]),
        )
        .await
        .expect("edit");

    let names: Vec<String> = harness.store.tag_names(&updated.tag_ids).into_iter().collect();
    assert_eq!(names, vec!["async".to_string(), "rust".to_string()]);
    assert_eq!(harness.renderer.calls(), 1);
}

#[tokio::test]
async fn unchanged_edit_is_rejected() {
    let harness = Harness::new();
    let (_, session) = harness.author("alice");
    let post = publish(&harness, &session).await;

    let err = harness
        .pipeline
        .edit_post(
            &session,
            edit_command(&post, " My First Post ", "# Hello\n", &["AI"]),
        )
        .await
        .expect_err("nothing changed");

    assert_eq!(kind(&err), FailureKind::Validation);
    assert!(err.public_message().contains("nothing changed"));
}

#[tokio::test]
async fn only_the_author_may_edit_or_delete() {
    let harness = Harness::new();
    let (_, alice) = harness.author("alice");
    let (_, bob) = harness.author("bob");
    let post = publish(&harness, &alice).await;

    let err = harness
        .pipeline
        .edit_post(&bob, edit_command(&post, "Hijacked", "# Hello", &["ai"]))
        .await
        .expect_err("not the author");
    assert_eq!(kind(&err), FailureKind::Unauthorized);

    let err = harness
        .pipeline
        .delete_post(&bob, post.id)
        .await
        .expect_err("not the author");
    assert_eq!(kind(&err), FailureKind::Unauthorized);

    assert_eq!(harness.store.post(post.id), Some(post));
}

#[tokio::test]
async fn cover_replacement_removes_the_previous_blob() {
    let harness = Harness::new();
    let (_, session) = harness.author("alice");
    let post = publish(&harness, &session).await;

    let mut command = edit_command(&post, "My First Post", "# Hello", &["ai"]);
    command.cover_image = Some(cover(640, 480));
    let updated = harness
        .pipeline
        .edit_post(&session, command)
        .await
        .expect("edit");

    assert_ne!(updated.cover_image_url, post.cover_image_url);
    assert_eq!(harness.blobs.put_keys().len(), 2);
    assert_eq!(
        harness.blobs.deleted_keys(),
        vec![key_of(&post.cover_image_url)]
    );
    assert_eq!(harness.renderer.calls(), 1);
}

#[tokio::test]
async fn failed_edit_removes_the_new_blob_and_keeps_the_old_one() {
    let harness = Harness::new();
    let (_, session) = harness.author("alice");
    let post = publish(&harness, &session).await;
    harness.store.fail_updates();

    let mut command = edit_command(&post, "My First Post", "# Hello", &["ai"]);
    command.cover_image = Some(cover(640, 480));
    let err = harness
        .pipeline
        .edit_post(&session, command)
        .await
        .expect_err("update fails");

    assert_eq!(kind(&err), FailureKind::Storage);
    let puts = harness.blobs.put_keys();
    assert_eq!(harness.blobs.deleted_keys(), vec![puts[1].clone()]);
    assert_eq!(
        harness.store.post(post.id).map(|stored| stored.cover_image_url),
        Some(post.cover_image_url)
    );
}

#[tokio::test]
async fn delete_succeeds_even_when_blob_delete_fails() {
    let harness = Harness::new();
    let (author, session) = harness.author("alice");
    let post = publish(&harness, &session).await;
    harness.drain_targets();
    harness.blobs.fail_deletes();

    harness
        .pipeline
        .delete_post(&session, post.id)
        .await
        .expect("delete");

    assert!(harness.store.post(post.id).is_none());
    assert_eq!(
        harness.blobs.deleted_keys(),
        vec![key_of(&post.cover_image_url)]
    );
    assert_eq!(
        harness.drain_targets(),
        vec![
            InvalidationTarget::PostDetail {
                slug: post.slug.clone()
            },
            InvalidationTarget::Home,
            InvalidationTarget::AuthorDashboard {
                author_id: author.id
            },
        ]
    );
}

#[tokio::test]
async fn deleting_a_missing_post_is_not_found() {
    let harness = Harness::new();
    let (_, session) = harness.author("alice");

    let err = harness
        .pipeline
        .delete_post(&session, uuid::Uuid::new_v4())
        .await
        .expect_err("missing post");
    assert_eq!(kind(&err), FailureKind::NotFound);
}
