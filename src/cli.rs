//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Resume edge - forwarding gateway and API client for the resume builder
#[derive(Parser, Debug)]
#[command(name = "resume-edge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "RESUME_EDGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "RESUME_EDGE_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "RESUME_EDGE_HOST")]
    pub host: Option<String>,

    /// Gateway URL used by client commands (including the mount prefix)
    #[arg(long, env = "RESUME_EDGE_GATEWAY_URL", global = true)]
    pub gateway_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "RESUME_EDGE_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "RESUME_EDGE_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the forwarding gateway (default)
    Serve,

    /// Print the resolved backend base URL and where it came from
    Backend,

    /// Sign in and store the credential pair
    Login {
        /// Username or email
        #[arg(short, long)]
        username: String,

        /// Password
        #[arg(long, env = "RESUME_EDGE_PASSWORD")]
        password: String,
    },

    /// Create an account
    Register {
        /// Username
        #[arg(short, long)]
        username: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password
        #[arg(long, env = "RESUME_EDGE_PASSWORD")]
        password: String,
    },

    /// Forget the stored credential pair
    Logout,

    /// Show the signed-in user
    Me,

    /// Saved resume commands
    #[command(subcommand)]
    Resumes(ResumeCommand),

    /// Show the status of an analysis job
    Analysis {
        /// Job ID
        id: String,
    },

    /// Open a public share link
    Shared {
        /// Share token
        token: String,
    },
}

/// Saved resume subcommands
#[derive(Subcommand, Debug)]
pub enum ResumeCommand {
    /// List saved resumes
    List,

    /// Delete a resume
    Delete {
        /// Resume ID
        id: u64,
    },

    /// Create a view-only share link
    Share {
        /// Resume ID
        id: u64,
    },

    /// Download the PDF export
    Export {
        /// Resume ID
        id: u64,

        /// Output file (default: the filename suggested by the server)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
