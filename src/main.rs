use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use folio::models::project::ProjectSettings;
use folio::store::Stores;
use folio::{api, config, AppState};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load()?;
    init_tracing(&cfg)?;

    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Sync { target }) => {
            let state = open_state(cfg).await?;
            handle_sync_command(&state, &target).await
        }
        Some(cli::Commands::Credential { command }) => {
            warn_if_ephemeral(&cfg);
            let stores = Stores::open(&cfg.database_url).await?;
            handle_credential_command(&stores, command).await
        }
        Some(cli::Commands::Project { command }) => {
            warn_if_ephemeral(&cfg);
            let stores = Stores::open(&cfg.database_url).await?;
            handle_project_command(&stores, command).await
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

/// `RUST_LOG` wins; otherwise `FOLIO_LOG_LEVEL` scopes the crate's own level.
/// An OTLP layer is added when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
fn init_tracing(cfg: &config::Config) -> anyhow::Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) => tracing_subscriber::EnvFilter::new(directives),
        Err(_) => match cfg.log_level.as_deref() {
            Some(level) => tracing_subscriber::EnvFilter::new(format!("folio={level},tower_http={level}")),
            None => tracing_subscriber::EnvFilter::new("folio=info,tower_http=info"),
        },
    };

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "folio"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .map_err(|e| anyhow::anyhow!("failed to install OpenTelemetry tracer: {}", e))?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    let json = std::env::var("FOLIO_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let fmt_layer = if json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(telemetry_layer)
        .init();
    Ok(())
}

/// Admin subcommands against the memory store only see this process's data.
fn warn_if_ephemeral(cfg: &config::Config) {
    if cfg.uses_memory_store() {
        tracing::warn!("DATABASE_URL is '{}'; changes made by this command are discarded on exit", cfg.database_url);
    }
}

async fn open_state(cfg: config::Config) -> anyhow::Result<Arc<AppState>> {
    let stores = Stores::open(&cfg.database_url).await?;
    let state = AppState::new(cfg, stores)?;
    state.seed_credentials().await?;
    Ok(Arc::new(state))
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    if cfg.admin_key.is_none() {
        tracing::warn!("FOLIO_ADMIN_KEY is not set; admin routes will refuse every request");
    }
    let state = open_state(cfg).await?;

    let app = api::app_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Folio listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_sync_command(state: &AppState, target: &str) -> anyhow::Result<()> {
    let report = state.sync.refresh(target).await?;
    println!("Synced {} project(s) from {}", report.synced.len(), report.endpoint);
    for name in report.synced {
        println!("  {}", name);
    }
    Ok(())
}

async fn handle_credential_command(
    stores: &Stores,
    cmd: cli::CredentialCommands,
) -> anyhow::Result<()> {
    match cmd {
        cli::CredentialCommands::Add { token } => {
            let token = token.trim().to_string();
            if token.is_empty() {
                anyhow::bail!("token must not be empty");
            }
            let fingerprint = folio::models::credential::fingerprint(&token);
            let inserted = stores.credentials.seed_tokens(&[token]).await?;
            if inserted > 0 {
                println!("Credential added: sha256:{}", fingerprint);
            } else {
                println!("Credential sha256:{} already present.", fingerprint);
            }
        }
        cli::CredentialCommands::List => {
            let creds = stores.credentials.list().await?;
            if creds.is_empty() {
                println!("No credentials found.");
                return Ok(());
            }

            println!(
                "{:<6} {:<20} {:<8} {:<6} LAST USED",
                "ID", "FINGERPRINT", "ENABLED", "FAILS"
            );
            for c in creds {
                let last_used = c
                    .last_used_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "never".into());
                println!(
                    "{:<6} {:<20} {:<8} {:<6} {}",
                    c.id,
                    format!("sha256:{}", c.fingerprint()),
                    c.enabled,
                    c.fail_count,
                    last_used
                );
            }
        }
        cli::CredentialCommands::Enable { id } => {
            if stores.credentials.enable(id).await? {
                println!("Credential {} enabled.", id);
            } else {
                println!("Credential {} not found.", id);
            }
        }
        cli::CredentialCommands::Remove { id } => {
            if stores.credentials.remove(id).await? {
                println!("Credential {} removed.", id);
            } else {
                println!("Credential {} not found.", id);
            }
        }
    }
    Ok(())
}

async fn handle_project_command(stores: &Stores, cmd: cli::ProjectCommands) -> anyhow::Result<()> {
    match cmd {
        cli::ProjectCommands::List { published } => {
            let projects = if published {
                stores.projects.list_published_projects().await?
            } else {
                stores.projects.list_projects().await?
            };
            if projects.is_empty() {
                println!("No projects found.");
                return Ok(());
            }

            println!("{:<6} {:<30} {:<8} UPDATED", "ID", "REPO", "PUBLIC");
            for p in projects {
                println!(
                    "{:<6} {:<30} {:<8} {}",
                    p.id,
                    p.repo_name,
                    p.enabled,
                    p.updated_at.format("%Y-%m-%d")
                );
            }
        }
        cli::ProjectCommands::Publish {
            id,
            hide,
            custom_url,
            image_url,
        } => {
            let current = stores
                .projects
                .list_projects()
                .await?
                .into_iter()
                .find(|p| p.id == id)
                .ok_or_else(|| anyhow::anyhow!("project {} not found", id))?;

            let settings = ProjectSettings {
                id,
                enabled: !hide,
                custom_url: custom_url.unwrap_or(current.custom_url),
                image_url,
            };
            stores.projects.update_project_settings(&settings).await?;
            println!(
                "Project {} ({}) is now {}.",
                id,
                current.repo_name,
                if hide { "hidden" } else { "published" }
            );
        }
    }
    Ok(())
}
