use std::{path::Path, process, sync::Arc};

use bytes::Bytes;
use inkpress::{
    application::{
        error::AppError,
        images::ImageUpload,
        invalidation::InvalidationQueue,
        pipeline::{CreatePostCommand, EditPostCommand, PipelineDeps, PostPipeline},
        queries::PostQueries,
        render::{HighlighterRegistry, MarkdownRenderer, RenderService},
        repos::{PostsRepo, TagsRepo},
        session::{RepoSessionResolver, Session, SessionResolver},
    },
    config::{self, CoverArgs, Settings},
    infra::{blob::HttpBlobStore, db::PostgresRepositories, error::InfraError, telemetry},
};
use serde::Serialize;
use tokio::fs;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let report = error.report();
    if dispatcher::has_been_set() {
        error!(source = report.source, error = %report.joined(), "Command failed");
    } else {
        let subscriber = tracing_fmt()
            .with_writer(std::io::stderr)
            .with_max_level(Level::ERROR)
            .finish();
        let dispatch = Dispatch::new(subscriber);
        dispatcher::with_default(&dispatch, || {
            error!(source = report.source, error = %report.joined(), "Command failed");
        });
    }

    match serde_json::to_string(&error.failure()) {
        Ok(failure) => eprintln!("{failure}"),
        Err(_) => eprintln!("{}", error.public_message()),
    }
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;

    telemetry::init(&settings.logging)?;

    match cli_args.command {
        config::Command::Migrate => run_migrate(&settings).await,
        config::Command::Render(args) => run_render(&settings, &args.input).await,
        config::Command::Create(args) => run_create(&settings, args).await,
        config::Command::Edit(args) => run_edit(&settings, args).await,
        config::Command::Delete(args) => run_delete(&settings, args).await,
        config::Command::Show(args) => run_show(&settings, &args.slug).await,
        config::Command::Tags => run_tags(&settings).await,
    }
}

async fn run_migrate(settings: &Settings) -> Result<(), AppError> {
    let pool = connect(settings).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    info!("Migrations applied");
    Ok(())
}

async fn run_render(settings: &Settings, input: &Path) -> Result<(), AppError> {
    let markdown = fs::read_to_string(input).await.map_err(InfraError::from)?;
    let renderer = build_renderer(&settings.render)?;
    let html = renderer.render(&markdown)?;
    println!("{html}");
    Ok(())
}

async fn run_create(settings: &Settings, args: config::CreateArgs) -> Result<(), AppError> {
    let app = Application::build(settings).await?;
    let session = app.session(args.session.token.as_deref()).await?;

    let cover_path = args
        .cover
        .path
        .as_deref()
        .ok_or_else(|| AppError::validation("cover_image", "a cover image is required"))?;
    let command = CreatePostCommand {
        title: args.title,
        markdown: read_markdown(&args.markdown).await?,
        tags: args.tags,
        cover_image: read_cover(cover_path, args.cover.content_type.clone()).await?,
    };

    let post = app.pipeline.create_post(&session, command).await?;
    app.flush_invalidations();
    print_json(&post)
}

async fn run_edit(settings: &Settings, args: config::EditArgs) -> Result<(), AppError> {
    let app = Application::build(settings).await?;
    let session = app.session(args.session.token.as_deref()).await?;

    let stored = PostsRepo::find_by_id(app.repositories.as_ref(), args.id)
        .await?
        .ok_or_else(|| AppError::not_found("post"))?;

    let title = args.title.unwrap_or_else(|| stored.title.clone());
    let markdown = match args.markdown.as_deref() {
        Some(path) => read_markdown(path).await?,
        None => stored.markdown_source.clone(),
    };
    let tags = if args.clear_tags {
        Vec::new()
    } else if let Some(tags) = args.tags {
        tags
    } else {
        app.repositories
            .list_for_post(stored.id)
            .await?
            .into_iter()
            .map(|tag| tag.name)
            .collect()
    };
    let cover_image = optional_cover(&args.cover).await?;

    let command = EditPostCommand {
        post_id: stored.id,
        title,
        markdown,
        tags,
        cover_image,
    };

    let post = app.pipeline.edit_post(&session, command).await?;
    app.flush_invalidations();
    print_json(&post)
}

async fn run_delete(settings: &Settings, args: config::DeleteArgs) -> Result<(), AppError> {
    let app = Application::build(settings).await?;
    let session = app.session(args.session.token.as_deref()).await?;

    app.pipeline.delete_post(&session, args.id).await?;
    app.flush_invalidations();

    #[derive(Serialize)]
    struct Deleted {
        id: uuid::Uuid,
    }
    print_json(&Deleted { id: args.id })
}

async fn run_show(settings: &Settings, slug: &str) -> Result<(), AppError> {
    let queries = read_side(settings).await?;
    let view = queries.post_by_slug(slug).await?;
    print_json(&view)
}

async fn run_tags(settings: &Settings) -> Result<(), AppError> {
    let queries = read_side(settings).await?;
    let tags = queries.tag_counts().await?;
    print_json(&tags)
}

struct Application {
    repositories: Arc<PostgresRepositories>,
    sessions: RepoSessionResolver,
    pipeline: PostPipeline,
    invalidations: Arc<InvalidationQueue>,
}

impl Application {
    async fn build(settings: &Settings) -> Result<Self, AppError> {
        let storage = settings
            .storage
            .as_ref()
            .ok_or_else(|| InfraError::configuration("storage endpoint is not configured"))?;
        let blob_store = Arc::new(HttpBlobStore::new(storage)?);

        let repositories = Arc::new(PostgresRepositories::new(connect(settings).await?));
        let renderer = Arc::new(build_renderer(&settings.render)?);
        let invalidations = Arc::new(InvalidationQueue::new());

        let pipeline = PostPipeline::new(PipelineDeps {
            posts: repositories.clone(),
            posts_writer: repositories.clone(),
            tags: repositories.clone(),
            tags_writer: repositories.clone(),
            blob_store,
            renderer,
            invalidation: invalidations.clone(),
            image_bounds: settings.images,
        });
        let sessions = RepoSessionResolver::new(repositories.clone(), repositories.clone());

        Ok(Self {
            repositories,
            sessions,
            pipeline,
            invalidations,
        })
    }

    async fn session(&self, token: Option<&str>) -> Result<Session, AppError> {
        Ok(self.sessions.resolve(token).await?)
    }

    /// Hand queued invalidations to downstream consumers. The CLI has none,
    /// so events are only logged.
    fn flush_invalidations(&self) {
        let events = self.invalidations.drain(usize::MAX);
        for event in &events {
            info!(event_id = %event.id, target = ?event.target, "Invalidation flushed");
        }
    }
}

async fn read_side(settings: &Settings) -> Result<PostQueries, AppError> {
    let repositories = Arc::new(PostgresRepositories::new(connect(settings).await?));
    Ok(PostQueries::new(
        repositories.clone(),
        repositories.clone(),
        repositories,
    ))
}

async fn connect(settings: &Settings) -> Result<sqlx::PgPool, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))
}

fn build_renderer(settings: &config::RenderSettings) -> Result<MarkdownRenderer, AppError> {
    let registry = match settings.highlight_languages.as_deref() {
        Some(languages) => {
            let registry = HighlighterRegistry::bundled_with(languages)?;
            for language in languages.iter().filter(|tag| !registry.knows(tag)) {
                warn!(language = %language, "Highlight language not in syntax pack");
            }
            registry
        }
        None => HighlighterRegistry::bundled()?,
    };
    Ok(MarkdownRenderer::new(registry))
}

async fn read_markdown(path: &Path) -> Result<String, AppError> {
    Ok(fs::read_to_string(path).await.map_err(InfraError::from)?)
}

async fn optional_cover(cover: &CoverArgs) -> Result<Option<ImageUpload>, AppError> {
    match cover.path.as_deref() {
        Some(path) => Ok(Some(read_cover(path, cover.content_type.clone()).await?)),
        None => Ok(None),
    }
}

async fn read_cover(path: &Path, content_type: Option<String>) -> Result<ImageUpload, AppError> {
    let bytes = fs::read(path).await.map_err(InfraError::from)?;
    let content_type = content_type.unwrap_or_else(|| {
        mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    });
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cover".to_string());

    Ok(ImageUpload {
        file_name,
        content_type,
        bytes: Bytes::from(bytes),
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
