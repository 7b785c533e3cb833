use anyhow::Result;
use clap::{Parser, Subcommand};

use backoffice_wizards::config::Config;
use backoffice_wizards::drafts::{DraftKey, DraftStatus};
use backoffice_wizards::logging::{self, RunMode};
use backoffice_wizards::rest::{self, ApiDoc, ApiState};
use backoffice_wizards::session::SessionContext;
use backoffice_wizards::wizards::{describe, WizardKind};

#[derive(Parser)]
#[command(name = "backoffice")]
#[command(about = "Resumable back-office wizards: onboarding, quotes and payslip runs")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API server
    Serve {
        /// Port to listen on (default from config: 7010)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print wizard definitions
    Wizards {
        /// Only print one wizard
        #[arg(short, long, value_enum)]
        kind: Option<WizardKind>,
    },

    /// Inspect or discard saved drafts
    Drafts {
        #[command(subcommand)]
        action: DraftsAction,
    },

    /// Print the OpenAPI document as JSON
    Openapi,
}

#[derive(Subcommand)]
enum DraftsAction {
    /// List saved drafts
    List,

    /// Show one draft with its data
    Show { key: String },

    /// Delete a draft
    Delete { key: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging setup)
    let config = Config::load(cli.config.as_deref())?;

    let mode = match cli.command {
        Commands::Serve { .. } => RunMode::Serve,
        _ => RunMode::Command,
    };
    let logging_handle = logging::init_logging(&config, mode, cli.debug)?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(path) = &logging_handle.log_file_path {
                eprintln!("Logging to {}", path.display());
            }
            cmd_serve(config, port).await?;
        }
        Commands::Wizards { kind } => {
            cmd_wizards(kind)?;
        }
        Commands::Drafts { action } => {
            cmd_drafts(&config, action).await?;
        }
        Commands::Openapi => {
            println!("{}", ApiDoc::json()?);
        }
    }

    Ok(())
}

async fn cmd_serve(config: Config, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or(config.rest_api.port);
    let addr = rest::listen_addr(&config.rest_api.host, port)?;

    let state = ApiState::from_config(config)?;
    println!("Starting REST API server on http://{}", addr);
    println!("Swagger UI: http://{}/swagger-ui", addr);

    rest::serve(state, addr).await
}

fn cmd_wizards(kind: Option<WizardKind>) -> Result<()> {
    let kinds = match kind {
        Some(kind) => vec![kind],
        None => WizardKind::all().to_vec(),
    };

    for kind in kinds {
        let summary = describe(kind)?;
        println!("{} ({})", summary.title, summary.kind);
        println!("{}", "─".repeat(60));
        for step in &summary.steps {
            let marker = if step.conditional { "?" } else { " " };
            println!("{} {:>2}. {:<18} {}", marker, step.id, step.slug, step.title);
            if !step.required.is_empty() {
                println!("       required: {}", step.required.join(", "));
            }
        }
        println!();
    }

    Ok(())
}

async fn cmd_drafts(config: &Config, action: DraftsAction) -> Result<()> {
    let context = SessionContext::from_config(config)?;
    let persistence = context.persistence;

    match action {
        DraftsAction::List => {
            let drafts = persistence.list_drafts().await?;
            if drafts.is_empty() {
                println!("No saved drafts");
                return Ok(());
            }

            println!("Saved drafts ({})", drafts.len());
            println!("{}", "─".repeat(60));
            for draft in drafts {
                let status = match draft.status {
                    DraftStatus::Draft => "draft",
                    DraftStatus::Complete => "complete",
                };
                println!(
                    "{:<38} {:<11} step {:<3} {:<9} {}",
                    draft.key.as_str(),
                    draft.kind.as_str(),
                    draft.current_step,
                    status,
                    draft.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        DraftsAction::Show { key } => {
            let key = DraftKey::new(key)?;
            match persistence.fetch_draft(&key).await? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => println!("No draft stored under '{}'", key),
            }
        }
        DraftsAction::Delete { key } => {
            let key = DraftKey::new(key)?;
            if persistence.delete_draft(&key).await? {
                println!("Deleted draft '{}'", key);
            } else {
                println!("No draft stored under '{}'", key);
            }
        }
    }

    Ok(())
}
