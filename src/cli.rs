use clap::{Parser, Subcommand};

/// Folio: personal site backend with a GitHub-mirrored project showcase
#[derive(Parser)]
#[command(name = "folio", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (defaults to FOLIO_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Sync projects from GitHub once and exit
    Sync {
        /// GitHub user/org, owner/repo, or profile/repository URL
        target: String,
    },

    /// Manage the GitHub credential pool
    Credential {
        #[command(subcommand)]
        command: CredentialCommands,
    },

    /// Manage showcase projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
}

#[derive(Subcommand)]
pub enum CredentialCommands {
    /// Add a GitHub token to the pool (no-op if already present)
    Add {
        #[arg(long, env = "FOLIO_NEW_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// List credentials (metadata only)
    List,
    /// Re-enable a disabled credential
    Enable { id: i64 },
    /// Remove a credential from the pool
    Remove { id: i64 },
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// List projects
    List {
        /// Only show projects visible on the public page
        #[arg(long)]
        published: bool,
    },
    /// Publish (or hide) a project and optionally override its links
    Publish {
        id: i64,
        /// Hide the project instead of publishing it
        #[arg(long)]
        hide: bool,
        #[arg(long)]
        custom_url: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
    },
}
