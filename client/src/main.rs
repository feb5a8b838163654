//! `fieldwatch` command-line client for the field monitoring API.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result};
use fieldwatch::config::ClientSettings;
use fieldwatch::domain::{FieldClient, LoginCredentials, PolygonFailurePolicy, attachment_url};
use fieldwatch::outbound::http::HttpFieldApi;
use fieldwatch::outbound::token_store::FileTokenStore;
use mockable::DefaultClock;
use ortho_config::OrthoConfig;
use tokio::runtime::Builder;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};
use url::Url;

type Client = FieldClient<HttpFieldApi, FileTokenStore>;

/// `fieldwatch` command arguments.
#[derive(Debug, Parser)]
#[command(
    name = "fieldwatch",
    about = "Inspect projects, sensor nodes and parcel maps from the field monitoring API",
    version
)]
struct Cli {
    /// Root URL of the field API. Overrides `FIELDWATCH_API_BASE_URL`.
    #[arg(long = "api-base-url", value_name = "url", global = true)]
    api_base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in and store the session.
    Login {
        /// Account username.
        #[arg(long, value_name = "name")]
        username: String,
        /// Account password.
        #[arg(long, env = "FIELDWATCH_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Revoke and forget the stored session.
    Logout,
    /// List the client's projects.
    Projects,
    /// Show projects with their sensor nodes and fire danger.
    Dashboard,
    /// Print the map scene for one project as JSON.
    Map {
        /// Project (polygon) identifier.
        #[arg(long = "project-id", value_name = "id")]
        project_id: i64,
        /// Fail on the first parcel with an invalid geometry.
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(error) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .try_init()
    {
        eprintln!("fieldwatch: tracing init failed: {error}");
    }

    let cli = Cli::parse();
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("failed to build Tokio runtime")?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let mut settings = ClientSettings::load_from_iter([OsString::from("fieldwatch")])
        .wrap_err("failed to load configuration")?;
    if let Some(url) = cli.api_base_url {
        settings.api_base_url = Some(url);
    }
    let base = settings.api_base_url()?;

    let api = HttpFieldApi::new(base.clone(), settings.request_timeout())
        .wrap_err("failed to build HTTP client")?;
    let token_path = settings.token_path();
    let store = FileTokenStore::open(&token_path)
        .wrap_err_with(|| format!("failed to open token store at {}", token_path.display()))?;
    let client = FieldClient::new(Arc::new(api), Arc::new(store), Arc::new(DefaultClock));
    if matches!(cli.command, Command::Login { .. } | Command::Logout) {
        client.restore_or_discard()?;
    } else {
        client.restore()?;
    }

    match cli.command {
        Command::Login { username, password } => login(&client, &username, &password).await,
        Command::Logout => {
            client.logout().await?;
            println!("state={}", client.state());
            Ok(())
        }
        Command::Projects => projects(&client).await,
        Command::Dashboard => dashboard(&client, &base).await,
        Command::Map { project_id, strict } => {
            let policy = if strict {
                PolygonFailurePolicy::Abort
            } else {
                PolygonFailurePolicy::Skip
            };
            let scene = client.map_scene(project_id, policy).await?;
            println!("{}", serde_json::to_string_pretty(&scene)?);
            Ok(())
        }
    }
}

async fn login(client: &Client, username: &str, password: &str) -> Result<()> {
    let credentials = LoginCredentials::try_from_parts(username, password)?;
    let display_name = client.login(&credentials).await?;
    println!("state={}", client.state());
    println!("display_name={display_name}");
    Ok(())
}

async fn projects(client: &Client) -> Result<()> {
    for project in client.client_projects().await? {
        println!(
            "project id={} name={:?} description={:?}",
            project.id, project.name, project.description
        );
    }
    Ok(())
}

async fn dashboard(client: &Client, base: &Url) -> Result<()> {
    for overview in client.dashboard().await? {
        let project = &overview.project;
        let attachment = project
            .attachment
            .as_deref()
            .and_then(|path| attachment_url(base, path).ok())
            .map(String::from)
            .unwrap_or_default();
        let ends_on = project.ends_on.map(|date| date.to_string()).unwrap_or_default();
        println!(
            "project id={} name={:?} ends_on={} expired={} attachment={}",
            project.id, project.name, ends_on, overview.expired, attachment
        );
        for node in &overview.nodes {
            let fwi = node.fwi.map(|fwi| fwi.to_string()).unwrap_or_default();
            println!(
                "node id={} project={} name={:?} fwi={} danger={:?}",
                node.id,
                project.id,
                node.name,
                fwi,
                node.danger()
            );
        }
        for node in overview.dangerous_nodes() {
            warn!(node_id = node.id, project_id = project.id, fwi = ?node.fwi, "fire danger alert");
        }
    }
    Ok(())
}
