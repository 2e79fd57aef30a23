//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;
use uuid::Uuid;

use crate::domain::uploads::{DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH, ImageBounds};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "inkpress";
const ENV_PREFIX: &str = "INKPRESS";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_STORAGE_TIMEOUT_SECS: u64 = 30;

/// Command-line arguments for the inkpress binary.
#[derive(Debug, Parser)]
#[command(name = "inkpress", version, about = "Markdown blog ingestion pipeline")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "INKPRESS_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL", global = true)]
    pub database_url: Option<String>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Apply pending database migrations.
    Migrate,
    /// Render a Markdown file to sanitized HTML on stdout.
    Render(RenderArgs),
    /// Publish a new post.
    Create(CreateArgs),
    /// Edit a post you authored. Omitted fields keep their stored value.
    Edit(EditArgs),
    /// Delete a post you authored.
    Delete(DeleteArgs),
    /// Print the post view for a slug as JSON.
    Show(ShowArgs),
    /// Print tags with their post counts as JSON.
    Tags,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    /// Markdown file to render.
    #[arg(long, value_name = "FILE")]
    pub input: PathBuf,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SessionArg {
    /// Session token of the acting user.
    #[arg(long = "session", env = "INKPRESS_SESSION", value_name = "TOKEN")]
    pub token: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct CoverArgs {
    /// Cover image file.
    #[arg(long = "cover", value_name = "FILE")]
    pub path: Option<PathBuf>,

    /// MIME type of the cover image; guessed from the file name when omitted.
    #[arg(long = "cover-type", value_name = "MIME")]
    pub content_type: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct CreateArgs {
    #[command(flatten)]
    pub session: SessionArg,

    #[arg(long, value_name = "TITLE")]
    pub title: String,

    /// Markdown file holding the post body.
    #[arg(long, value_name = "FILE")]
    pub markdown: PathBuf,

    /// Tag name; repeat for several tags.
    #[arg(long = "tag", value_name = "NAME")]
    pub tags: Vec<String>,

    #[command(flatten)]
    pub cover: CoverArgs,
}

#[derive(Debug, Args, Clone)]
pub struct EditArgs {
    #[command(flatten)]
    pub session: SessionArg,

    /// Id of the post to edit.
    #[arg(value_name = "POST_ID")]
    pub id: Uuid,

    #[arg(long, value_name = "TITLE")]
    pub title: Option<String>,

    #[arg(long, value_name = "FILE")]
    pub markdown: Option<PathBuf>,

    /// Replacement tag set; repeat for several tags.
    #[arg(long = "tag", value_name = "NAME")]
    pub tags: Option<Vec<String>>,

    /// Drop every tag from the post.
    #[arg(long = "clear-tags", conflicts_with = "tags")]
    pub clear_tags: bool,

    #[command(flatten)]
    pub cover: CoverArgs,
}

#[derive(Debug, Args, Clone)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub session: SessionArg,

    #[arg(value_name = "POST_ID")]
    pub id: Uuid,
}

#[derive(Debug, Args, Clone)]
pub struct ShowArgs {
    #[arg(value_name = "SLUG")]
    pub slug: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub storage: Option<StorageSettings>,
    pub images: ImageBounds,
    pub render: RenderSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

/// Blob store connection. Absent when no endpoint is configured.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub endpoint: Url,
    pub zone: String,
    pub access_key: String,
    pub public_base_url: Url,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct RenderSettings {
    /// `None` registers every bundled syntax.
    pub highlight_languages: Option<Vec<String>>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Parse the process arguments and resolve settings from them.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    storage: RawStorageSettings,
    images: RawImageSettings,
    render: RawRenderSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            database,
            storage,
            images,
            render,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            storage: build_storage_settings(storage)?,
            images: build_image_bounds(images)?,
            render: build_render_settings(render)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_blank(database.url);
    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_storage_settings(
    storage: RawStorageSettings,
) -> Result<Option<StorageSettings>, LoadError> {
    let timeout_secs = storage
        .request_timeout_seconds
        .unwrap_or(DEFAULT_STORAGE_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "storage.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    let Some(endpoint) = non_blank(storage.endpoint) else {
        return Ok(None);
    };
    let endpoint = parse_http_url(&endpoint, "storage.endpoint")?;

    let zone = non_blank(storage.zone)
        .ok_or_else(|| LoadError::invalid("storage.zone", "required when an endpoint is set"))?;
    if zone.contains('/') {
        return Err(LoadError::invalid(
            "storage.zone",
            "must be a single path segment",
        ));
    }
    let access_key = non_blank(storage.access_key).ok_or_else(|| {
        LoadError::invalid("storage.access_key", "required when an endpoint is set")
    })?;
    let public_base_url = non_blank(storage.public_base_url).ok_or_else(|| {
        LoadError::invalid(
            "storage.public_base_url",
            "required when an endpoint is set",
        )
    })?;
    let public_base_url = parse_http_url(&public_base_url, "storage.public_base_url")?;

    Ok(Some(StorageSettings {
        endpoint,
        zone,
        access_key,
        public_base_url,
        request_timeout: Duration::from_secs(timeout_secs),
    }))
}

fn build_image_bounds(images: RawImageSettings) -> Result<ImageBounds, LoadError> {
    let max_width = non_zero_u32(
        images.max_width.unwrap_or(DEFAULT_MAX_WIDTH).into(),
        "images.max_width",
    )?;
    let max_height = non_zero_u32(
        images.max_height.unwrap_or(DEFAULT_MAX_HEIGHT).into(),
        "images.max_height",
    )?;

    Ok(ImageBounds {
        max_width: max_width.get(),
        max_height: max_height.get(),
    })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let highlight_languages = match render.highlight_languages {
        None => None,
        Some(languages) => {
            let languages: Vec<String> = languages
                .into_iter()
                .map(|language| language.trim().to_ascii_lowercase())
                .filter(|language| !language.is_empty())
                .collect();
            if languages.is_empty() {
                return Err(LoadError::invalid(
                    "render.highlight_languages",
                    "must name at least one language when set",
                ));
            }
            Some(languages)
        }
    };

    Ok(RenderSettings {
        highlight_languages,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    endpoint: Option<String>,
    zone: Option<String>,
    access_key: Option<String>,
    public_base_url: Option<String>,
    request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawImageSettings {
    max_width: Option<u32>,
    max_height: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    highlight_languages: Option<Vec<String>>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_http_url(value: &str, key: &'static str) -> Result<Url, LoadError> {
    let url = Url::parse(value).map_err(|err| LoadError::invalid(key, err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(key, "scheme must be http or https"));
    }
    Ok(url)
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
