//! Resume edge - forwarding gateway and API client for the resume builder

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use resume_edge::{
    cli::{Cli, Command, ResumeCommand},
    Error,
    client::{ApiClient, CredentialStore, FileCredentialStore},
    config::Config,
    gateway::Gateway,
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Some(Command::Serve) | None => run_server(config).await,
        Some(Command::Backend) => {
            let base = config.backend_base();
            println!("{base} (from {})", base.source());
            ExitCode::SUCCESS
        }
        Some(command) => match run_client_command(&config, command).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("❌ {e:#}");
                if e.downcast_ref::<Error>().is_some_and(Error::is_auth_failure) {
                    eprintln!("💡 Tip: run `resume-edge login -u <username>` to sign in again");
                }
                ExitCode::FAILURE
            }
        },
    }
}

/// Load configuration and apply CLI overrides
fn load_config(cli: &Cli) -> resume_edge::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(ref host) = cli.host {
        config.server.host.clone_from(host);
    }
    if let Some(ref url) = cli.gateway_url {
        config.client.gateway_url.clone_from(url);
    }
    Ok(config)
}

/// Run the forwarding gateway
async fn run_server(config: Config) -> ExitCode {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        mount = %config.server.mount,
        "Starting resume edge gateway"
    );

    let gateway = match Gateway::new(config) {
        Ok(g) => g,
        Err(e) => {
            error!("Failed to create gateway: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = gateway.run().await {
        error!("Gateway error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Gateway shutdown complete");
    ExitCode::SUCCESS
}

/// Run a client subcommand against the gateway
async fn run_client_command(config: &Config, command: Command) -> anyhow::Result<()> {
    let store = Arc::new(FileCredentialStore::new(config.credentials_path()?));
    let api = ApiClient::from_config(&config.client, store)?;

    match command {
        Command::Login { username, password } => {
            let pair = api.login(&username, &password).await?;
            println!(
                "✅ Signed in as @{}",
                pair.username.as_deref().unwrap_or(&username)
            );
        }
        Command::Register {
            username,
            email,
            password,
        } => {
            let user = api.register(&username, &email, &password).await?;
            println!("✅ Account created for @{}", user.username);
            println!("💡 Tip: run `resume-edge login -u {}` to sign in", user.username);
        }
        Command::Logout => {
            api.logout()?;
            println!("Signed out.");
        }
        Command::Me => {
            require_session(&api)?;
            let user = api.me().await?;
            println!("@{}", user.username);
            if !user.email.is_empty() {
                println!("   Email: {}", user.email);
            }
        }
        Command::Resumes(resume_cmd) => {
            require_session(&api)?;
            run_resume_command(&api, resume_cmd).await?;
        }
        Command::Analysis { id } => {
            let status = api.analysis_status(&id).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Shared { token } => {
            let resume = api.shared_resume(&token).await?;
            println!("{}", serde_json::to_string_pretty(&resume)?);
        }
        Command::Serve | Command::Backend => anyhow::bail!("not a client command"),
    }

    Ok(())
}

/// Fail early when no access token is stored
fn require_session(api: &ApiClient) -> anyhow::Result<()> {
    if !api.store().load()?.is_authenticated() {
        anyhow::bail!("Not signed in. Run `resume-edge login -u <username>` first.");
    }
    Ok(())
}

/// Saved resume subcommands
async fn run_resume_command(api: &ApiClient, command: ResumeCommand) -> anyhow::Result<()> {
    match command {
        ResumeCommand::List => {
            let resumes = api.list_resumes().await?;
            if resumes.is_empty() {
                println!("No saved resumes.");
                return Ok(());
            }
            println!("Found {} saved resume(s):\n", resumes.len());
            for resume in &resumes {
                let id = resume.get("id").map(ToString::to_string).unwrap_or_default();
                let title = resume
                    .get("title")
                    .and_then(|t| t.as_str())
                    .unwrap_or("(untitled)");
                let updated = resume
                    .get("updated_at")
                    .and_then(|t| t.as_str())
                    .unwrap_or("");
                println!("  {id:>6}  {title}  {updated}");
            }
        }
        ResumeCommand::Delete { id } => {
            api.delete_resume(id).await?;
            println!("Resume {id} deleted.");
        }
        ResumeCommand::Share { id } => {
            let link = api.share_resume(id).await?;
            println!("{}", link.url);
        }
        ResumeCommand::Export { id, output } => {
            let download = api.export_resume(id).await?;
            // Never let the server pick a directory
            let suggested = Path::new(&download.filename)
                .file_name()
                .map_or_else(|| PathBuf::from("resume.pdf"), PathBuf::from);
            let path = output.unwrap_or(suggested);
            tokio::fs::write(&path, &download.bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "✅ Saved {} ({} bytes)",
                path.display(),
                download.bytes.len()
            );
        }
    }
    Ok(())
}
