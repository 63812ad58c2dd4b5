//! `backoffice` command-line client.
//!
//! Drives the same session container, guard and backend client the
//! dashboard uses, against a live API. Results are printed as JSON on stdout;
//! logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use backoffice_auth::{RouteTable, Session, catalog, explain};
use backoffice_client::{
    AuthError, ClientConfig, Credentials, FileTokenStore, HttpAuthBackend, MemoryTokenStore,
    Navigation, RouteGuard, SessionContext, TokenStore,
};

#[derive(Debug, Parser)]
#[command(name = "backoffice", about = "Back-office session and access-control client")]
struct Cli {
    /// Override `BACKOFFICE_API_URL`.
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Override `BACKOFFICE_SESSION_FILE`.
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,

    /// Keep the session in memory only.
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Exchange credentials for a session.
    Login {
        email: String,
        #[arg(long, env = "BACKOFFICE_PASSWORD", hide_env_values = true)]
        password: String,
        /// Two-factor code, if the backend asks for one.
        #[arg(long)]
        code: Option<String>,
    },
    /// Finish a two-factor login started by an earlier `login`.
    Verify {
        email: String,
        code: String,
    },
    /// End the session (local state is cleared even if the server call fails).
    Logout,
    /// Reload and print the current user, roles and permissions.
    Whoami,
    /// Evaluate the route guard for a dashboard path.
    Check { path: String },
    /// List the catalogued permissions and roles, marking those the session holds.
    Permissions {
        /// Only list one category (e.g. `payments`).
        #[arg(long)]
        category: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    backoffice_observability::init();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env().context("invalid client configuration")?;
    if let Some(api_url) = cli.api_url {
        config = config.with_api_url(api_url);
    }
    if cli.session_file.is_some() {
        config.session_file = cli.session_file;
    }

    let store: Arc<dyn TokenStore> = if cli.ephemeral {
        Arc::new(MemoryTokenStore::new())
    } else {
        Arc::new(FileTokenStore::at(config.session_file.clone())?)
    };
    let backend = Arc::new(HttpAuthBackend::new(&config)?);
    tracing::debug!(api_url = %backend.api_url(), "backend configured");

    let ctx = SessionContext::bootstrap(backend, store, config.permission_cache_ttl);

    match cli.command {
        Command::Login { email, password, code } => {
            match ctx.login(&Credentials::new(email, password)).await {
                Ok(()) => {}
                Err(AuthError::TwoFactorRequired { email }) => match code {
                    Some(code) => ctx.verify_two_factor(&code).await?,
                    None => {
                        print(&json!({ "two_factor_required": true, "email": email }))?;
                        return Ok(());
                    }
                },
                Err(err) => return Err(err.into()),
            }
            print(&whoami(&ctx))?;
        }
        Command::Verify { email, code } => {
            ctx.verify_two_factor_for(&email, &code).await?;
            print(&whoami(&ctx))?;
        }
        Command::Logout => {
            ctx.logout().await;
            print(&json!({ "authenticated": false }))?;
        }
        Command::Whoami => {
            if ctx.token().is_some() {
                ctx.refresh_permissions().await?;
            }
            print(&whoami(&ctx))?;
        }
        Command::Check { path } => {
            let routes = Arc::new(RouteTable::dashboard());
            let rule = routes.rule_for(&path);
            let guard = RouteGuard::new(ctx.clone(), routes);

            let verdict = guard.evaluate(&path).await;
            let explanation = ctx.evaluate(|ev| explain(ev, &rule));
            let navigate_to = match verdict.clone().into_navigation() {
                Navigation::Proceed => path.clone(),
                Navigation::Redirect(location) => location.to_href(),
            };

            print(&json!({
                "path": path,
                "verdict": verdict,
                "navigate_to": navigate_to,
                "explanation": explanation,
            }))?;
        }
        Command::Permissions { category } => {
            print(&permissions(&ctx.snapshot(), category.as_deref()))?;
        }
    }

    Ok(())
}

fn permissions(session: &Session, category: Option<&str>) -> serde_json::Value {
    let evaluator = session.evaluator();
    let definitions: Vec<_> = match category {
        Some(name) => catalog::category(name).collect(),
        None => catalog::PERMISSIONS.iter().collect(),
    };

    let permissions: Vec<_> = definitions
        .into_iter()
        .map(|d| {
            json!({
                "key": d.key,
                "category": d.category,
                "description": d.description,
                "held": evaluator.has_permission(d.key),
            })
        })
        .collect();
    let roles: Vec<_> = catalog::ROLES
        .iter()
        .map(|r| {
            json!({
                "name": r.name,
                "description": r.description,
                "held": evaluator.has_role(r.name),
            })
        })
        .collect();

    json!({ "permissions": permissions, "roles": roles })
}

fn whoami(ctx: &SessionContext) -> serde_json::Value {
    let session = ctx.snapshot();
    json!({
        "authenticated": session.is_authenticated(),
        "user": session.user(),
        "roles": session
            .roles()
            .iter()
            .map(|r| {
                json!({
                    "name": r,
                    "description": catalog::role(r.as_str()).map(|d| d.description),
                })
            })
            .collect::<Vec<_>>(),
        "permissions": session.permissions(),
        "pending_verification": session.pending_verification(),
    })
}

fn print(value: &serde_json::Value) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}
