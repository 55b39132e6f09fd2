//! # Issue Chat CLI
//!
//! Command-line interface for chat rooms kept in GitHub issues.
//!
//! This module provides CLI commands for:
//! - Logging in and out with a personal access token
//! - Listing, creating and editing chat rooms
//! - Reading and writing messages
//! - Following a room live

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser, Subcommand};
use issue_chat_core::{
    ChatClient, ChatError, ChatMessage, ChatRoom, ChatSession, ClientConfig, CommentId,
    Credential, FileTokenStore, MessageQuery, NewRoom, RepositoryRef, RoomNumber, RoomQuery,
    RoomState, RoomStateFilter, RoomUpdate, SessionConfig, TokenStore,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ============================================================================
// CLI Structure
// ============================================================================

/// Issue Chat - chat rooms on GitHub issues
#[derive(Parser)]
#[command(name = "issue-chat")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Chat rooms backed by GitHub issues")]
#[command(
    long_about = "Issue Chat treats labelled issues of a repository as chat rooms and their comments as messages"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ISSUE_CHAT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level; overrides the configured level
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Chat repository as owner/name; overrides the configured repository
    #[arg(short, long, env = "ISSUE_CHAT_REPO", global = true)]
    pub repo: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Store a personal access token after checking it with GitHub
    Login {
        /// Token to store
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Remove the stored token
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Chat room commands
    Rooms {
        #[command(subcommand)]
        action: RoomCommands,
    },

    /// Message commands
    Messages {
        #[command(subcommand)]
        action: MessageCommands,
    },

    /// Follow a room and print messages as they arrive
    Watch {
        /// Room number
        room: RoomNumber,

        /// Poll interval in seconds; overrides the configured interval
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Show the resolved configuration
    Config,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Room subcommands
#[derive(Subcommand)]
pub enum RoomCommands {
    /// List chat rooms
    List {
        /// Filter by state: open, closed or all
        #[arg(short, long, default_value = "open")]
        state: RoomStateFilter,

        /// Page size
        #[arg(long)]
        per_page: Option<u32>,

        /// Page number, starting at 1
        #[arg(long)]
        page: Option<u32>,
    },

    /// Show a room
    Show {
        /// Room number
        room: RoomNumber,

        /// Include the first page of messages
        #[arg(short, long)]
        messages: bool,
    },

    /// Open a new room
    Create {
        /// Room title
        title: String,

        /// Room description
        #[arg(short, long)]
        body: Option<String>,

        /// Extra labels; the marker label is always added
        #[arg(long = "label")]
        labels: Vec<String>,
    },

    /// Change a room
    Update {
        /// Room number
        room: RoomNumber,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New description
        #[arg(long)]
        body: Option<String>,

        /// New state: open or closed
        #[arg(long)]
        state: Option<RoomState>,

        /// Replacement labels; the marker label is always kept
        #[arg(long = "label")]
        labels: Option<Vec<String>>,
    },

    /// Close a room
    Close {
        /// Room number
        room: RoomNumber,
    },

    /// Create the marker label in the repository if it is missing
    InitLabel,
}

/// Message subcommands
#[derive(Subcommand)]
pub enum MessageCommands {
    /// List messages in a room
    List {
        /// Room number
        room: RoomNumber,

        /// Only messages updated at or after this RFC 3339 time
        #[arg(long)]
        since: Option<DateTime<Utc>>,

        /// Page size
        #[arg(long)]
        per_page: Option<u32>,

        /// Page number, starting at 1
        #[arg(long)]
        page: Option<u32>,
    },

    /// Post a message
    Send {
        /// Room number
        room: RoomNumber,

        /// Message text
        content: String,
    },

    /// Replace a message's text
    Edit {
        /// Message id
        id: CommentId,

        /// New message text
        content: String,
    },

    /// Delete a message
    Delete {
        /// Message id
        id: CommentId,
    },
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Not logged in; run `issue-chat login` first")]
    NotLoggedIn,

    #[error("{}", .0.user_message())]
    Chat(#[from] ChatError),

    #[error("Output failed: {message}")]
    Output { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 2,
            Self::NotLoggedIn => 3,
            Self::Chat(ChatError::Validation(_)) => 4,
            Self::Chat(ChatError::Api(_)) => 5,
            Self::Chat(ChatError::Storage(_)) | Self::Io(_) => 6,
            Self::Output { .. } => 1,
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Output {
            message: err.to_string(),
        }
    }
}

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Could not load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Missing required configuration: {key}")]
    MissingRequired { key: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

// ============================================================================
// Configuration Types
// ============================================================================

/// CLI configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CliConfig {
    /// GitHub connection settings
    pub github: GithubSettings,

    /// Chat repository settings
    pub chat: ChatSettings,

    /// Background refresh timers
    pub session: SessionSettings,

    /// Default logging configuration
    pub logging: LoggingConfig,
}

/// GitHub connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GithubSettings {
    pub api_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graphql_url: Option<String>,
    pub timeout_seconds: u64,
    pub prefer_graphql: bool,
    /// Token file; the platform config directory when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,
}

impl Default for GithubSettings {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            api_url: client.api_url,
            graphql_url: None,
            timeout_seconds: client.timeout.as_secs(),
            prefer_graphql: client.prefer_graphql,
            token_file: None,
        }
    }
}

/// Chat repository settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Repository as owner/name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    pub marker_label: String,
    pub messages_per_page: u32,
}

impl Default for ChatSettings {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            repository: None,
            marker_label: client.marker_label,
            messages_per_page: client.messages_per_page,
        }
    }
}

/// Background refresh timers
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionSettings {
    pub poll_interval_seconds: u64,
    pub refresh_debounce_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            poll_interval_seconds: session.poll_interval.as_secs(),
            refresh_debounce_ms: session.refresh_debounce.as_millis() as u64,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum LogFormat {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "json")]
    Json,
}

impl CliConfig {
    /// Client configuration, with `repo_override` taking precedence over the
    /// configured repository.
    pub fn client_config(&self, repo_override: Option<&str>) -> Result<ClientConfig, ConfigError> {
        let repository = repo_override
            .or(self.chat.repository.as_deref())
            .ok_or_else(|| ConfigError::MissingRequired {
                key: "chat.repository".to_string(),
            })?
            .parse::<RepositoryRef>()
            .map_err(|e| ConfigError::InvalidValue {
                key: "chat.repository".to_string(),
                message: e.to_string(),
            })?;

        let mut config = ClientConfig::default()
            .with_api_url(&self.github.api_url)
            .with_timeout(Duration::from_secs(self.github.timeout_seconds))
            .with_prefer_graphql(self.github.prefer_graphql)
            .with_repository(repository)
            .with_marker_label(&self.chat.marker_label)
            .with_messages_per_page(self.chat.messages_per_page);
        if let Some(graphql_url) = &self.github.graphql_url {
            config = config.with_graphql_url(graphql_url);
        }
        Ok(config)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_poll_interval(Duration::from_secs(self.session.poll_interval_seconds.max(1)))
            .with_refresh_debounce(Duration::from_millis(self.session.refresh_debounce_ms))
    }

    /// Where the token is kept.
    pub fn token_store(&self) -> Result<FileTokenStore, ChatError> {
        match &self.github.token_file {
            Some(path) => Ok(FileTokenStore::new(path)),
            None => Ok(FileTokenStore::default_location()?),
        }
    }
}

/// Default user configuration file location.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("issue-chat").join("config.toml"))
}

/// Load configuration.
///
/// Sources, later ones overriding earlier ones:
///  1. built-in defaults
///  2. `<config_dir>/issue-chat/config.toml`, if present
///  3. the file given by `--config`, which must exist
///  4. environment variables prefixed `ISSUE_CHAT__`, e.g.
///     `ISSUE_CHAT__CHAT__REPOSITORY=octo/chat` sets `chat.repository`
pub fn load_configuration(explicit: Option<&Path>) -> Result<CliConfig, ConfigError> {
    load_configuration_from(default_config_path().as_deref(), explicit)
}

/// Load configuration with an explicit user file location.
pub fn load_configuration_from(
    user_file: Option<&Path>,
    explicit: Option<&Path>,
) -> Result<CliConfig, ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = user_file {
        builder = builder.add_source(
            config::File::from(path)
                .required(false)
                .format(config::FileFormat::Toml),
        );
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        debug!(path = %path.display(), "Loading configuration from explicit path");
        builder = builder.add_source(
            config::File::from(path)
                .required(true)
                .format(config::FileFormat::Toml),
        );
    }

    let config = builder
        .add_source(
            config::Environment::with_prefix("ISSUE_CHAT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}

// ============================================================================
// Logging
// ============================================================================

/// Install the tracing subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init_logging(level: &str, json: bool) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| ConfigError::InvalidValue {
            key: "logging.level".to_string(),
            message: e.to_string(),
        })?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| CliError::Output {
        message: format!("Could not initialise logging: {}", e),
    })
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    run(Cli::parse()).await
}

/// Execute parsed CLI arguments.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    if let Commands::Completions { shell } = cli.command {
        return execute_completions_command(shell);
    }

    let config = load_configuration(cli.config.as_deref())?;
    init_logging(
        cli.log_level.as_deref().unwrap_or(&config.logging.level),
        cli.json_logs || config.logging.format == LogFormat::Json,
    )?;

    let format = cli.format;
    let repo = cli.repo.as_deref();
    match cli.command {
        Commands::Config => execute_config_command(&config, format),
        Commands::Login { token } => {
            let session = open_session(&config, repo, false).await?;
            execute_login_command(&session, token, format).await
        }
        Commands::Logout => execute_logout_command(&config, format).await,
        Commands::Whoami => {
            let session = open_session(&config, repo, true).await?;
            execute_whoami_command(&session, format).await
        }
        Commands::Rooms { action } => {
            let session = open_session(&config, repo, true).await?;
            execute_rooms_command(session.client(), action, format).await
        }
        Commands::Messages { action } => {
            let session = open_session(&config, repo, true).await?;
            execute_messages_command(&session, action, format).await
        }
        Commands::Watch { room, interval } => {
            let mut config = config;
            if let Some(seconds) = interval {
                config.session.poll_interval_seconds = seconds;
            }
            let session = open_session(&config, repo, true).await?;
            execute_watch_command(&session, room, format).await
        }
        Commands::Completions { .. } => Ok(()),
    }
}

/// Build the client and session; with `restore` the stored token is loaded.
async fn open_session(
    config: &CliConfig,
    repo: Option<&str>,
    restore: bool,
) -> Result<ChatSession, CliError> {
    let client = ChatClient::builder()
        .config(config.client_config(repo)?)
        .build()
        .map_err(ChatError::from)?;
    let store: Arc<dyn TokenStore> = Arc::new(config.token_store()?);

    let session = if restore {
        ChatSession::restore(client, store, config.session_config()).await?
    } else {
        ChatSession::new(client, store, config.session_config())
    };
    Ok(session)
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn execute_login_command(
    session: &ChatSession,
    token: String,
    format: OutputFormat,
) -> Result<(), CliError> {
    let user = session.login(Credential::new(token)).await?;
    info!(user = %user.login, "Stored credential");

    match format {
        OutputFormat::Json => print_json(&user),
        OutputFormat::Text => {
            println!("Logged in as {}", user.login);
            Ok(())
        }
    }
}

async fn execute_logout_command(config: &CliConfig, format: OutputFormat) -> Result<(), CliError> {
    let store = config.token_store()?;
    store.clear().await.map_err(ChatError::from)?;
    info!(path = %store.path().display(), "Removed stored credential");

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "logged_out": true })),
        OutputFormat::Text => {
            println!("Logged out");
            Ok(())
        }
    }
}

async fn execute_whoami_command(session: &ChatSession, format: OutputFormat) -> Result<(), CliError> {
    if !session.client().has_token() {
        return Err(CliError::NotLoggedIn);
    }

    let user = match session.current_user() {
        Some(user) => user,
        None => session.client().get_current_user().await?,
    };
    let access = session.client().check_repository_access().await?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "user": user,
            "repository": session.client().repository().to_string(),
            "repository_access": access,
        })),
        OutputFormat::Text => {
            match &user.name {
                Some(name) => println!("{} ({})", user.login, name),
                None => println!("{}", user.login),
            }
            let verdict = if access { "yes" } else { "no" };
            println!("access to {}: {}", session.client().repository(), verdict);
            Ok(())
        }
    }
}

async fn execute_rooms_command(
    client: &ChatClient,
    action: RoomCommands,
    format: OutputFormat,
) -> Result<(), CliError> {
    match action {
        RoomCommands::List {
            state,
            per_page,
            page,
        } => {
            let rooms = client
                .list_chat_rooms(&RoomQuery {
                    state,
                    per_page,
                    page,
                })
                .await?;
            match format {
                OutputFormat::Json => print_json(&rooms),
                OutputFormat::Text => {
                    if rooms.is_empty() {
                        println!("No chat rooms");
                    }
                    for room in &rooms {
                        println!("{}", room_line(room));
                    }
                    Ok(())
                }
            }
        }
        RoomCommands::Show { room, messages } => {
            if messages {
                let thread = client.get_room_thread(room).await?;
                match format {
                    OutputFormat::Json => print_json(&thread),
                    OutputFormat::Text => {
                        print_room_detail(&thread.room);
                        for message in &thread.messages {
                            println!("{}", message_line(message));
                        }
                        Ok(())
                    }
                }
            } else {
                let room = client.get_chat_room(room).await?;
                match format {
                    OutputFormat::Json => print_json(&room),
                    OutputFormat::Text => {
                        print_room_detail(&room);
                        Ok(())
                    }
                }
            }
        }
        RoomCommands::Create {
            title,
            body,
            labels,
        } => {
            require_token(client)?;
            let mut new_room = NewRoom::new(title);
            if let Some(body) = body {
                new_room = new_room.with_body(body);
            }
            for label in labels {
                new_room = new_room.with_label(label);
            }
            let room = client.create_chat_room(&new_room).await?;
            print_room_result("Created", &room, format)
        }
        RoomCommands::Update {
            room,
            title,
            body,
            state,
            labels,
        } => {
            require_token(client)?;
            let update = RoomUpdate {
                title,
                body,
                state,
                labels,
            };
            let room = client.update_chat_room(room, &update).await?;
            print_room_result("Updated", &room, format)
        }
        RoomCommands::Close { room } => {
            require_token(client)?;
            let room = client.close_chat_room(room).await?;
            print_room_result("Closed", &room, format)
        }
        RoomCommands::InitLabel => {
            require_token(client)?;
            let label = client.ensure_marker_label().await?;
            match format {
                OutputFormat::Json => print_json(&label),
                OutputFormat::Text => {
                    println!("Label '{}' is ready", label.name);
                    Ok(())
                }
            }
        }
    }
}

async fn execute_messages_command(
    session: &ChatSession,
    action: MessageCommands,
    format: OutputFormat,
) -> Result<(), CliError> {
    let client = session.client();
    match action {
        MessageCommands::List {
            room,
            since,
            per_page,
            page,
        } => {
            let query = MessageQuery {
                since,
                per_page,
                page,
            };
            let messages = client.list_messages(room, &query).await?;
            match format {
                OutputFormat::Json => print_json(&messages),
                OutputFormat::Text => {
                    for message in &messages {
                        println!("{}", message_line(message));
                    }
                    Ok(())
                }
            }
        }
        MessageCommands::Send { room, content } => {
            require_token(client)?;
            let message = session.send_message(room, &content).await?;
            print_message_result("Sent", &message, format)
        }
        MessageCommands::Edit { id, content } => {
            require_token(client)?;
            let message = session.edit_message(id, &content).await?;
            print_message_result("Edited", &message, format)
        }
        MessageCommands::Delete { id } => {
            require_token(client)?;
            session.delete_message(id).await?;
            match format {
                OutputFormat::Json => print_json(&serde_json::json!({ "deleted": id })),
                OutputFormat::Text => {
                    println!("Deleted message {}", id);
                    Ok(())
                }
            }
        }
    }
}

/// Print the room's messages, then follow the feed until interrupted.
async fn execute_watch_command(
    session: &ChatSession,
    room: RoomNumber,
    format: OutputFormat,
) -> Result<(), CliError> {
    let mut feed = session.subscribe();
    let mut printed: HashMap<CommentId, DateTime<Utc>> = HashMap::new();

    let messages = session.load_messages(room).await?;
    print_new_messages(&messages, &mut printed, format)?;
    session.start_realtime_updates(room);
    info!(room = %room, "Watching room; press Ctrl-C to stop");

    loop {
        tokio::select! {
            changed = feed.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = feed.borrow_and_update().clone();
                if let Some(error) = &snapshot.last_error {
                    eprintln!("warning: {}", error.user_message());
                }
                print_new_messages(&snapshot.messages, &mut printed, format)?;
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    session.dispose();
    Ok(())
}

fn execute_config_command(config: &CliConfig, format: OutputFormat) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => print_json(config),
        OutputFormat::Text => {
            let rendered = toml::to_string_pretty(config).map_err(|e| CliError::Output {
                message: e.to_string(),
            })?;
            print!("{}", rendered);
            Ok(())
        }
    }
}

fn execute_completions_command(shell: clap_complete::Shell) -> Result<(), CliError> {
    let mut command = Cli::command();
    clap_complete::generate(shell, &mut command, "issue-chat", &mut std::io::stdout());
    Ok(())
}

// ============================================================================
// Output helpers
// ============================================================================

fn require_token(client: &ChatClient) -> Result<(), CliError> {
    if client.has_token() {
        Ok(())
    } else {
        Err(CliError::NotLoggedIn)
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

/// One-line room summary.
pub fn room_line(room: &ChatRoom) -> String {
    format!(
        "{} [{}] {} ({} messages, by {})",
        room.number, room.state, room.title, room.comment_count, room.author.login
    )
}

/// One-line message rendering.
pub fn message_line(message: &ChatMessage) -> String {
    let edited = if message.is_edited() { " (edited)" } else { "" };
    format!(
        "[{}] {} #{}: {}{}",
        message.created_at.format("%Y-%m-%d %H:%M"),
        message.author.login,
        message.id,
        message.body,
        edited
    )
}

fn print_room_detail(room: &ChatRoom) {
    println!("{}", room_line(room));
    if let Some(body) = room.body.as_deref().filter(|b| !b.trim().is_empty()) {
        println!();
        println!("{}", body);
    }
    println!();
    println!("{}", room.html_url);
}

fn print_room_result(verb: &str, room: &ChatRoom, format: OutputFormat) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => print_json(room),
        OutputFormat::Text => {
            println!("{} room {}: {}", verb, room.number, room.title);
            Ok(())
        }
    }
}

fn print_message_result(
    verb: &str,
    message: &ChatMessage,
    format: OutputFormat,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => print_json(message),
        OutputFormat::Text => {
            println!("{} message {}", verb, message.id);
            Ok(())
        }
    }
}

/// Print messages not yet printed, or printed before their latest edit.
fn print_new_messages(
    messages: &[ChatMessage],
    printed: &mut HashMap<CommentId, DateTime<Utc>>,
    format: OutputFormat,
) -> Result<(), CliError> {
    for message in messages {
        if printed.get(&message.id) == Some(&message.updated_at) {
            continue;
        }
        printed.insert(message.id, message.updated_at);
        match format {
            OutputFormat::Json => {
                let mut stdout = std::io::stdout().lock();
                serde_json::to_writer(&mut stdout, message)?;
                writeln!(stdout)?;
            }
            OutputFormat::Text => println!("{}", message_line(message)),
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
