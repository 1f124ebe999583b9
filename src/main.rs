use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use positron::api::ApiClient;
use positron::api::types::{Apod, Settings};
use positron::auth;
use positron::banner::{BannerInfo, mask_token, print_banner};
use positron::config::{ClientSettings, Config, KNOWN_KEYS};
use positron::consts::default_db_path;
use positron::stores::Stores;
use positron::updater::ws::WsConnector;
use positron::updater::{ConnectionManager, ConnectionStatus, TopicRegistry, Updater, updater_url};

#[derive(Parser)]
#[command(name = "positron", version, about = "Live view of a Positron backend.")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// SQLite database for config and tokens (default: ~/.positron/positron.db)
    #[arg(short, long, global = true)]
    db: Option<String>,

    /// Backend base URL, overriding the stored `backend_url`
    #[arg(short, long, global = true)]
    backend_url: Option<Url>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Watch live resources and print them whenever they change
    Watch {
        /// Resource to watch (repeatable; default: all lists)
        #[arg(short, long = "resource", value_enum)]
        resources: Vec<Resource>,

        /// Media date (RFC 3339) for the `apod-image` resource
        #[arg(long)]
        date: Option<String>,
    },
    /// Show or change the signed-in account
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },
    /// Look up or rate media of the day
    Apod {
        #[command(subcommand)]
        action: ApodAction,
    },
    /// Manage the stored session token
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Read or change stored configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum AccountAction {
    /// Print the profile the token belongs to
    Info,
    /// Skip the OAuth consent screen for known clients
    InstantConfirm {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
}

#[derive(Subcommand)]
enum ApodAction {
    /// Print the title and submitter for a date (RFC 3339)
    Info { date: String },
    /// Mark the media for a date as good, or as bad with `--bad`
    Rate {
        date: String,
        #[arg(long)]
        bad: bool,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Store a session token for the backend
    Set { token: String },
    /// Forget the stored token
    Clear,
    /// Show the token in use (masked)
    Show,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print one key, or every known key
    Get { key: Option<String> },
    Set { key: String, value: String },
    Unset { key: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Resource {
    Users,
    Groups,
    OauthClients,
    OauthClientUsers,
    OauthClientGroups,
    OauthScopes,
    OauthScopeNames,
    OauthPolicies,
    OauthPolicyInfos,
    Passkeys,
    Settings,
    Apods,
    ApodImage,
}

impl Resource {
    fn label(self) -> &'static str {
        match self {
            Resource::Users => "users",
            Resource::Groups => "groups",
            Resource::OauthClients => "oauth-clients",
            Resource::OauthClientUsers => "oauth-client-users",
            Resource::OauthClientGroups => "oauth-client-groups",
            Resource::OauthScopes => "oauth-scopes",
            Resource::OauthScopeNames => "oauth-scope-names",
            Resource::OauthPolicies => "oauth-policies",
            Resource::OauthPolicyInfos => "oauth-policy-infos",
            Resource::Passkeys => "passkeys",
            Resource::Settings => "settings",
            Resource::Apods => "apods",
            Resource::ApodImage => "apod-image",
        }
    }

    fn spawn_printer(self, stores: &Stores) -> JoinHandle<()> {
        let label = self.label();
        match self {
            Resource::Users => print_json(label, &stores.users),
            Resource::Groups => print_json(label, &stores.groups),
            Resource::OauthClients => print_json(label, &stores.oauth_clients),
            Resource::OauthClientUsers => print_json(label, &stores.oauth_client_users),
            Resource::OauthClientGroups => print_json(label, &stores.oauth_client_groups),
            Resource::OauthScopes => print_json(label, &stores.oauth_scopes),
            Resource::OauthScopeNames => print_json(label, &stores.oauth_scope_names),
            Resource::OauthPolicies => print_json(label, &stores.oauth_policies),
            Resource::OauthPolicyInfos => print_json(label, &stores.oauth_policy_infos),
            Resource::Passkeys => print_json(label, &stores.passkeys),
            Resource::Settings => print_json(label, &stores.settings),
            Resource::Apods => print_with(label, &stores.apods, |apods| {
                apods
                    .iter()
                    .map(|a| format!("{}  {}", a.date, a.title))
                    .collect::<Vec<_>>()
                    .join("\n")
            }),
            Resource::ApodImage => print_with(label, &stores.apod_image, |apod: &Apod| {
                format!("{} bytes of base64 image data", apod.image.len())
            }),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let db_path = match cli.db {
        Some(path) => path,
        None => {
            let path = default_db_path();
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
            }
            path.to_string_lossy().into_owned()
        }
    };

    let config = Config::open(&db_path)?;
    let mut settings = ClientSettings::load(&config)?;
    if let Some(url) = cli.backend_url {
        settings.backend_url = url;
    }

    match cli.command {
        Command::Watch { resources, date } => watch(&db_path, settings, resources, date).await,
        Command::Account { action } => handle_account(&db_path, &settings.backend_url, action).await,
        Command::Apod { action } => handle_apod(&db_path, &settings.backend_url, action).await,
        Command::Token { action } => handle_token(&db_path, &settings.backend_url, action),
        Command::Config { action } => handle_config(&config, action),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,positron={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn watch(
    db_path: &str,
    settings: ClientSettings,
    resources: Vec<Resource>,
    date: Option<String>,
) -> Result<()> {
    let resources = resolve_resources(resources, date.is_some())?;
    let backend = settings.backend_url.clone();
    let token = auth::resolve_token(db_path, &backend)?;

    let api = Arc::new(ApiClient::new(backend.clone(), token.as_deref())?);
    let registry = Arc::new(TopicRegistry::new());
    let stores = Stores::new(Arc::clone(&api), Arc::clone(&registry));
    let manager = ConnectionManager::new(
        Arc::clone(&registry),
        Arc::new(WsConnector),
        updater_url(&backend, token.as_deref())?,
        settings.connection,
    );

    let labels: Vec<&str> = resources.iter().map(|r| r.label()).collect();
    let auth_status = if token.is_some() {
        "token ✓"
    } else {
        "no token (cookie-less requests will be rejected)"
    };
    print_banner(&BannerInfo {
        backend: backend.as_str(),
        auth_status,
        db: db_path,
        resources: &labels,
    });

    let printers: Vec<JoinHandle<()>> = resources
        .iter()
        .map(|r| r.spawn_printer(&stores))
        .collect();
    if let Some(date) = date {
        stores.set_apod_date(date).await;
    }

    manager.connect();

    let mut status = manager.watch_status();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            println!();
        }
        reason = wait_for_failure(&mut status) => {
            eprintln!("updater stopped: {reason}");
        }
    }

    manager.dispose().await;
    for printer in printers {
        printer.abort();
    }
    Ok(())
}

/// Default to every list when none is named. The media image needs a date
/// to fetch anything.
fn resolve_resources(resources: Vec<Resource>, has_date: bool) -> Result<Vec<Resource>> {
    let mut resources = if resources.is_empty() {
        Resource::value_variants()
            .iter()
            .copied()
            .filter(|r| *r != Resource::ApodImage)
            .collect()
    } else {
        resources
    };
    if resources.contains(&Resource::ApodImage) && !has_date {
        bail!("--resource apod-image needs --date");
    }
    resources.sort_by_key(|r| r.label());
    resources.dedup();
    Ok(resources)
}

fn api_client(db_path: &str, backend: &Url) -> Result<ApiClient> {
    let token = auth::resolve_token(db_path, backend)?;
    if token.is_none() {
        bail!("no token for {}; run `positron token set <jwt>`", auth::backend_key(backend));
    }
    ApiClient::new(backend.clone(), token.as_deref())
}

/// Log status transitions until the manager records a permanent failure.
async fn wait_for_failure(status: &mut watch::Receiver<ConnectionStatus>) -> String {
    loop {
        let current = status.borrow_and_update().clone();
        info!(status = ?current, "updater status");
        if let ConnectionStatus::Failed(reason) = current {
            return reason;
        }
        if status.changed().await.is_err() {
            return "connection manager dropped".to_string();
        }
    }
}

fn print_json<T>(label: &'static str, cell: &Updater<T>) -> JoinHandle<()>
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    print_with(label, cell, |value| {
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unprintable: {e}>"))
    })
}

fn print_with<T, F>(label: &'static str, cell: &Updater<T>, render: F) -> JoinHandle<()>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(&T) -> String + Send + 'static,
{
    let mut observer = cell.observe();
    tokio::spawn(async move {
        while let Some(value) = observer.changed().await {
            println!("── {label} ──\n{}\n", render(&value));
        }
    })
}

async fn handle_account(db_path: &str, backend: &Url, action: AccountAction) -> Result<()> {
    let api = api_client(db_path, backend)?;
    match action {
        AccountAction::Info => {
            let info = api
                .current_account()
                .await
                .context("failed to load account")?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        AccountAction::InstantConfirm { enabled } => {
            api.update_settings(&Settings {
                o_auth_instant_confirm: enabled,
            })
            .await
            .context("failed to update settings")?;
            println!("✓ instant confirm {}", if enabled { "on" } else { "off" });
        }
    }
    Ok(())
}

async fn handle_apod(db_path: &str, backend: &Url, action: ApodAction) -> Result<()> {
    let api = api_client(db_path, backend)?;
    match action {
        ApodAction::Info { date } => {
            match api.apod_info(&date).await.context("failed to load media info")? {
                Some(data) => {
                    let by = data.user.map_or_else(|| "unknown".to_string(), |u| u.name);
                    println!("{}  (by {by})", data.title);
                }
                None => println!("no media for {date}"),
            }
        }
        ApodAction::Rate { date, bad } => {
            api.set_apod_good(!bad, &date)
                .await
                .context("failed to rate media")?;
            println!("✓ {date} marked {}", if bad { "bad" } else { "good" });
        }
    }
    Ok(())
}

fn handle_token(db_path: &str, backend: &Url, action: TokenAction) -> Result<()> {
    match action {
        TokenAction::Set { token } => {
            auth::login(db_path, backend, &token)?;
            println!("✓ token saved for {}", auth::backend_key(backend));
        }
        TokenAction::Clear => {
            auth::logout(db_path, backend)?;
            println!("✓ token removed for {}", auth::backend_key(backend));
        }
        TokenAction::Show => match auth::resolve_token(db_path, backend)? {
            Some(token) => println!("{}  {}", auth::backend_key(backend), mask_token(&token)),
            None => println!("{}  not set", auth::backend_key(backend)),
        },
    }
    Ok(())
}

fn handle_config(config: &Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Get { key: Some(key) } => match config.get(&key)? {
            Some(value) => println!("{value}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Get { key: None } => {
            for key in KNOWN_KEYS {
                let value = config.get(key)?.unwrap_or_else(|| "(default)".to_string());
                println!("{key:<24} {value}");
            }
        }
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            println!("✓ {key} = {value}");
        }
        ConfigAction::Unset { key } => {
            config.remove(&key)?;
            println!("✓ {key} unset");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_resources_skip_apod_image() {
        let resources = resolve_resources(Vec::new(), false).unwrap();
        assert!(!resources.contains(&Resource::ApodImage));
        assert!(resources.contains(&Resource::OauthPolicyInfos));
    }

    #[test]
    fn apod_image_without_date_is_rejected() {
        let err = resolve_resources(vec![Resource::ApodImage], false).unwrap_err();
        assert!(err.to_string().contains("--date"));
    }

    #[test]
    fn apod_image_with_date_is_accepted() {
        let resources =
            resolve_resources(vec![Resource::ApodImage, Resource::Users], true).unwrap();
        assert_eq!(resources, vec![Resource::ApodImage, Resource::Users]);
    }

    #[test]
    fn duplicate_resources_collapse() {
        let resources =
            resolve_resources(vec![Resource::Groups, Resource::Users, Resource::Groups], false)
                .unwrap();
        assert_eq!(resources, vec![Resource::Groups, Resource::Users]);
    }

    #[test]
    fn instant_confirm_takes_a_bool() {
        let cli = Cli::try_parse_from(["positron", "account", "instant-confirm", "false"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Account {
                action: AccountAction::InstantConfirm { enabled: false }
            }
        ));
    }
}
