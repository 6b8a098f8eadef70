//! # Survey-Hooks CLI
//!
//! Command-line interface for configuring outbound survey webhooks.
//!
//! This module provides CLI commands for:
//! - Listing and inspecting webhooks of an environment
//! - Updating a webhook's name, endpoint, triggers and survey scope
//! - Deleting webhooks
//! - Checking endpoint reachability
//! - Showing the effective configuration
//!
//! Every webhook command runs through the environment access gate with the
//! principal given by `--principal` (or `SURVEY_HOOKS_PRINCIPAL`).

use clap::{Args, CommandFactory, Parser, Subcommand};
use survey_hooks_core::{
    adapters::{FilesystemWebhookStore, InMemoryMembershipStore, StaticSessionProvider},
    config::{ConfigError, Settings},
    notifications::{delete_feedback, probe_feedback, update_feedback},
    probe::ProbeError,
    EnvironmentAccessGate, EnvironmentId, Feedback, FeedbackSink, HttpEndpointProbe, Principal,
    PrincipalId, ProbeMode, ProbeOutcome, ScopeSelection, SessionProvider, StoreError, SurveyId,
    TriggerKind, ValidationError, Webhook, WebhookCandidate, WebhookId, WebhookSettingsError,
    WebhookSettingsService, WebhookSubscriptionManager,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ============================================================================
// CLI Structure
// ============================================================================

/// Survey-Hooks CLI - Webhook configuration for survey environments
#[derive(Parser)]
#[command(name = "survey-hooks")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Configure outbound webhooks for survey environments")]
#[command(
    long_about = "Survey-Hooks manages which survey events are delivered to which endpoints, \
                  verifying every endpoint before a configuration is committed"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SURVEY_HOOKS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (overrides logging.level)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Principal acting on the environment
    #[arg(short, long, env = "SURVEY_HOOKS_PRINCIPAL", global = true)]
    pub principal: Option<String>,

    /// Environment owning the webhooks
    #[arg(short, long, env = "SURVEY_HOOKS_ENVIRONMENT", global = true)]
    pub environment: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// List webhooks of the environment
    List {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show webhook details
    Show {
        /// Webhook ID to display
        webhook_id: String,

        /// Output format
        #[arg(short, long, default_value = "yaml")]
        format: OutputFormat,
    },

    /// Replace a webhook's configuration
    ///
    /// Options not given keep their stored value. The endpoint is probed
    /// before anything is written.
    Update {
        /// Webhook ID to update
        webhook_id: String,

        #[command(flatten)]
        changes: UpdateArgs,
    },

    /// Delete a webhook permanently
    Delete {
        /// Webhook ID to delete
        webhook_id: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Check whether an endpoint accepts deliveries
    TestEndpoint {
        /// Endpoint URL to probe
        url: String,
    },

    /// List trigger kinds available to webhooks
    Triggers,

    /// List surveys a webhook can be scoped to
    Surveys {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the effective configuration
    Config {
        /// Output format for configuration
        #[arg(short = 'f', long, default_value = "yaml")]
        format: ConfigFormat,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Changes requested by `update`
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateArgs {
    /// New display name
    #[arg(long, conflicts_with = "clear_name")]
    pub name: Option<String>,

    /// Remove the display name
    #[arg(long)]
    pub clear_name: bool,

    /// New endpoint URL
    #[arg(long)]
    pub url: Option<String>,

    /// Trigger to subscribe to; repeat for several. Replaces the stored set.
    #[arg(long = "trigger", value_name = "TRIGGER")]
    pub triggers: Vec<String>,

    /// Deliver events of every survey in the environment
    #[arg(long, conflicts_with = "surveys")]
    pub all_surveys: bool,

    /// Survey to scope deliveries to; repeat for several. Replaces the stored
    /// scope.
    #[arg(long = "survey", value_name = "SURVEY_ID")]
    pub surveys: Vec<String>,
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}

/// Configuration format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
    /// TOML format
    Toml,
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Failed to initialize logging: {message}")]
    Logging { message: String },

    #[error("Probe setup failed: {0}")]
    Probe(#[from] ProbeError),

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("{0}")]
    Settings(#[from] WebhookSettingsError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to render output: {message}")]
    Output { message: String },
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::Logging { .. } | Self::Probe(_) => 1,
            Self::InvalidArgument { .. } => 3,
            Self::Settings(e) => match e {
                WebhookSettingsError::Unauthenticated | WebhookSettingsError::NotAuthorized(_) => 2,
                WebhookSettingsError::ImmutableSource { .. }
                | WebhookSettingsError::EmptyTriggerSet
                | WebhookSettingsError::UnknownTrigger { .. }
                | WebhookSettingsError::EmptyScopeSet => 3,
                WebhookSettingsError::EndpointUnreachable { .. } => 4,
                WebhookSettingsError::NotFound { .. } => 5,
                WebhookSettingsError::PersistenceFailure { .. } => 6,
            },
            Self::Store(_) | Self::Output { .. } => 6,
        }
    }

    /// Message shown to the operator
    pub fn operator_message(&self) -> String {
        match self {
            Self::Settings(e) => update_feedback(&Err(e.clone())).to_string(),
            other => other.to_string(),
        }
    }
}

fn invalid_argument(arg: &str, error: impl std::fmt::Display) -> CliError {
    CliError::InvalidArgument {
        arg: arg.to_string(),
        message: error.to_string(),
    }
}

fn output_error(error: impl std::fmt::Display) -> CliError {
    CliError::Output {
        message: error.to_string(),
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    run(Cli::parse()).await
}

/// Execute already parsed arguments
pub async fn run(cli: Cli) -> Result<(), CliError> {
    if let Commands::Completions { shell } = cli.command {
        return execute_completions_command(shell);
    }

    let settings = load_configuration(cli.config.as_deref())?;
    initialize_logging(&cli, &settings)?;

    if let Commands::Config { format } = cli.command {
        return execute_config_command(&settings, format);
    }

    let context = CommandContext::new(&cli, &settings).await?;
    let sink = ConsoleSink;

    match cli.command {
        Commands::List { format } => execute_list_command(&context, format).await,
        Commands::Show { webhook_id, format } => {
            execute_show_command(&context, &webhook_id, format).await
        }
        Commands::Update {
            webhook_id,
            changes,
        } => execute_update_command(&context, &sink, &webhook_id, &changes).await,
        Commands::Delete { webhook_id, yes } => {
            execute_delete_command(&context, &sink, &webhook_id, yes).await
        }
        Commands::TestEndpoint { url } => execute_test_endpoint_command(&context, &sink, &url).await,
        Commands::Triggers => execute_triggers_command(&context).await,
        Commands::Surveys { format } => execute_surveys_command(&context, format).await,
        Commands::Config { .. } | Commands::Completions { .. } => Ok(()),
    }
}

// ============================================================================
// Setup
// ============================================================================

/// Initialize logging based on CLI arguments and settings
///
/// Logs go to stderr so command output on stdout stays machine-readable.
fn initialize_logging(cli: &Cli, settings: &Settings) -> Result<(), CliError> {
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| settings.logging.level.clone());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("survey_hooks_cli={level},survey_hooks_core={level}").into()
    });

    let result = if cli.json_logs || settings.logging.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| CliError::Logging {
        message: e.to_string(),
    })
}

/// Load settings, falling back to the per-user settings file
fn load_configuration(config_path: Option<&Path>) -> Result<Settings, CliError> {
    let user_settings = user_settings_path().filter(|path| path.is_file());
    let explicit = config_path.or(user_settings.as_deref());

    Ok(Settings::load(explicit)?)
}

/// `<config_dir>/survey-hooks/settings.yaml`, where the platform has one
pub fn user_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("survey-hooks").join("settings.yaml"))
}

/// Everything a webhook command needs
struct CommandContext {
    service: WebhookSettingsService,
    session: StaticSessionProvider,
    environment: Option<String>,
}

impl CommandContext {
    async fn new(cli: &Cli, settings: &Settings) -> Result<Self, CliError> {
        let store = Arc::new(FilesystemWebhookStore::new(settings.storage.data_dir.clone()).await?);
        debug!(data_dir = %store.data_dir().display(), "Opened webhook store");

        let probe = Arc::new(HttpEndpointProbe::new(settings.probe.clone())?);
        let membership = InMemoryMembershipStore::with_grants(settings.membership_grants()?);

        let manager = WebhookSubscriptionManager::new(
            store.clone(),
            store,
            probe,
            settings.trigger_catalog()?,
        );
        let gate = EnvironmentAccessGate::new(Arc::new(membership));

        let session = match &cli.principal {
            Some(id) => StaticSessionProvider::signed_in(Principal::new(
                PrincipalId::new(id.as_str()).map_err(|e| invalid_argument("principal", e))?,
            )),
            None => StaticSessionProvider::anonymous(),
        };

        debug!(principal = ?cli.principal, "Command context ready");

        Ok(Self {
            service: WebhookSettingsService::new(gate, manager),
            session,
            environment: cli.environment.clone(),
        })
    }

    /// Principal of the session; none means the operator must sign in first
    async fn principal(&self) -> Result<PrincipalId, CliError> {
        self.session
            .current_principal()
            .await
            .map(|p| p.id)
            .ok_or(CliError::Settings(WebhookSettingsError::Unauthenticated))
    }

    fn environment(&self) -> Result<EnvironmentId, CliError> {
        let raw = self.environment.as_deref().ok_or_else(|| {
            invalid_argument("environment", "required (--environment or SURVEY_HOOKS_ENVIRONMENT)")
        })?;
        EnvironmentId::new(raw).map_err(|e| invalid_argument("environment", e))
    }

    /// Principal and environment of every gated call
    async fn actor(&self) -> Result<(PrincipalId, EnvironmentId), CliError> {
        Ok((self.principal().await?, self.environment()?))
    }
}

/// Prints successes to stdout and failures to stderr
struct ConsoleSink;

impl FeedbackSink for ConsoleSink {
    fn notify(&self, feedback: Feedback) {
        match feedback {
            Feedback::Success(message) => println!("{}", message),
            Feedback::Error(message) => eprintln!("{}", message),
        }
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn execute_list_command(context: &CommandContext, format: OutputFormat) -> Result<(), CliError> {
    let (principal, environment) = context.actor().await?;
    let webhooks = context
        .service
        .list_webhooks(&principal, &environment)
        .await?;

    match format {
        OutputFormat::Text => {
            if webhooks.is_empty() {
                println!("No webhooks in environment {}", environment);
            }
            for webhook in &webhooks {
                println!("{}", render_webhook_line(webhook));
            }
        }
        other => println!("{}", render_structured(&webhooks, other)?),
    }

    Ok(())
}

async fn execute_show_command(
    context: &CommandContext,
    webhook_id: &str,
    format: OutputFormat,
) -> Result<(), CliError> {
    let (principal, environment) = context.actor().await?;
    let webhook_id = parse_webhook_id(webhook_id)?;
    let webhook = context
        .service
        .get_webhook(&principal, &environment, &webhook_id)
        .await?;

    match format {
        OutputFormat::Text => println!("{}", render_webhook_line(&webhook)),
        other => println!("{}", render_structured(&webhook, other)?),
    }

    Ok(())
}

async fn execute_update_command(
    context: &CommandContext,
    sink: &dyn FeedbackSink,
    webhook_id: &str,
    changes: &UpdateArgs,
) -> Result<(), CliError> {
    let (principal, environment) = context.actor().await?;
    let webhook_id = parse_webhook_id(webhook_id)?;

    let current = context
        .service
        .get_webhook(&principal, &environment, &webhook_id)
        .await?;
    let candidate = build_candidate(&current, changes)?;

    info!(webhook_id = %webhook_id, "Submitting webhook update");
    let result = context
        .service
        .update_webhook(&principal, &environment, &webhook_id, candidate)
        .await;

    if result.is_ok() {
        sink.notify(update_feedback(&result));
    }
    result?;
    Ok(())
}

async fn execute_delete_command(
    context: &CommandContext,
    sink: &dyn FeedbackSink,
    webhook_id: &str,
    yes: bool,
) -> Result<(), CliError> {
    if !yes {
        return Err(invalid_argument(
            "yes",
            "deletion is permanent; pass --yes to confirm",
        ));
    }

    let (principal, environment) = context.actor().await?;
    let webhook_id = parse_webhook_id(webhook_id)?;

    let result = context
        .service
        .delete_webhook(&principal, &environment, &webhook_id)
        .await;

    if result.is_ok() {
        sink.notify(delete_feedback(&result));
    }
    result?;
    Ok(())
}

async fn execute_test_endpoint_command(
    context: &CommandContext,
    sink: &dyn FeedbackSink,
    url: &str,
) -> Result<(), CliError> {
    let (principal, environment) = context.actor().await?;
    let outcome = context
        .service
        .test_endpoint(&principal, &environment, url)
        .await?;

    match outcome {
        ProbeOutcome::Reachable { .. } => {
            if let Some(feedback) = probe_feedback(ProbeMode::ManualCheck, &outcome) {
                sink.notify(feedback);
            }
            Ok(())
        }
        ProbeOutcome::Unreachable { reason } => Err(CliError::Settings(
            WebhookSettingsError::EndpointUnreachable {
                url: url.to_string(),
                reason,
            },
        )),
    }
}

async fn execute_triggers_command(context: &CommandContext) -> Result<(), CliError> {
    let (principal, environment) = context.actor().await?;
    let catalog = context
        .service
        .trigger_catalog(&principal, &environment)
        .await?;

    for kind in catalog.iter() {
        println!("{}", kind);
    }
    Ok(())
}

async fn execute_surveys_command(
    context: &CommandContext,
    format: OutputFormat,
) -> Result<(), CliError> {
    let (principal, environment) = context.actor().await?;
    let surveys = context
        .service
        .scope_candidates(&principal, &environment)
        .await?;

    match format {
        OutputFormat::Text => {
            for survey in &surveys {
                println!("{}\t{}", survey.id, survey.name);
            }
        }
        other => println!("{}", render_structured(&surveys, other)?),
    }
    Ok(())
}

fn execute_config_command(settings: &Settings, format: ConfigFormat) -> Result<(), CliError> {
    println!("{}", render_settings(settings, format)?);
    Ok(())
}

fn execute_completions_command(shell: clap_complete::Shell) -> Result<(), CliError> {
    let mut command = Cli::command();
    clap_complete::generate(shell, &mut command, "survey-hooks", &mut std::io::stdout());
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_webhook_id(raw: &str) -> Result<WebhookId, CliError> {
    WebhookId::new(raw).map_err(|e: ValidationError| invalid_argument("webhook_id", e))
}

/// Apply requested changes on top of the stored configuration
///
/// The result is a complete replacement: untouched fields keep their stored
/// values.
pub fn build_candidate(
    current: &Webhook,
    changes: &UpdateArgs,
) -> Result<WebhookCandidate, CliError> {
    let mut candidate = WebhookCandidate::from_webhook(current);

    if changes.clear_name {
        candidate.name = None;
    } else if let Some(name) = &changes.name {
        candidate.name = Some(name.clone());
    }

    if let Some(url) = &changes.url {
        candidate.url = url.clone();
    }

    if !changes.triggers.is_empty() {
        candidate.triggers = changes
            .triggers
            .iter()
            .map(|tag| TriggerKind::new(tag.as_str()).map_err(|e| invalid_argument("trigger", e)))
            .collect::<Result<BTreeSet<_>, _>>()?;
    }

    if changes.all_surveys {
        candidate.scope_selection.set_all_surveys(true);
    } else if !changes.surveys.is_empty() {
        let ids = changes
            .surveys
            .iter()
            .map(|id| SurveyId::new(id.as_str()).map_err(|e| invalid_argument("survey", e)))
            .collect::<Result<Vec<_>, _>>()?;
        candidate.scope_selection = ScopeSelection::subset(ids);
    }

    Ok(candidate)
}

/// One-line summary of a webhook
pub fn render_webhook_line(webhook: &Webhook) -> String {
    let triggers: Vec<&str> = webhook.triggers.iter().map(|t| t.as_str()).collect();
    let scope = if webhook.scope.is_all() {
        "all surveys".to_string()
    } else {
        let ids: Vec<String> = webhook
            .scope
            .to_survey_ids()
            .iter()
            .map(|id| id.to_string())
            .collect();
        format!("surveys: {}", ids.join(","))
    };

    format!(
        "{}\t{}\t{}\t{}\t[{}]\t{}",
        webhook.id,
        webhook.name.as_deref().unwrap_or("-"),
        webhook.source,
        webhook.url,
        triggers.join(","),
        scope
    )
}

fn render_structured<T: serde::Serialize + ?Sized>(
    value: &T,
    format: OutputFormat,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Json | OutputFormat::Text => {
            serde_json::to_string_pretty(value).map_err(output_error)
        }
        OutputFormat::Yaml => serde_yaml::to_string(value).map_err(output_error),
    }
}

/// Render the effective settings
pub fn render_settings(settings: &Settings, format: ConfigFormat) -> Result<String, CliError> {
    match format {
        ConfigFormat::Yaml => serde_yaml::to_string(settings).map_err(output_error),
        ConfigFormat::Json => serde_json::to_string_pretty(settings).map_err(output_error),
        ConfigFormat::Toml => toml::to_string_pretty(settings).map_err(output_error),
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
