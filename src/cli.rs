// src/cli.rs
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use reqwest::Method;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use crate::app_log;
use crate::claims::TokenClaims;
use crate::client::ApiClients;
use crate::config::ClientConfig;
use crate::navigation::{Location, Navigator};
use crate::role::Role;
use crate::session::Session;
use crate::storage::FileStore;
use crate::transport::{ApiResponse, RequestConfig};

#[derive(Parser)]
#[command(name = "jobboard")]
#[command(about = "Talk to the job board API with role-scoped credentials")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Token store file (defaults to the configured storage path)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Role context for this invocation (jobseeker or recruiter)
    #[arg(long, global = true)]
    pub context: Option<Role>,

    /// Send verb commands through the public client
    #[arg(long, global = true)]
    pub public: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Obtain and store a credential pair for a role
    Login {
        #[arg(long)]
        role: Role,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the stored credentials of a role
    Logout {
        #[arg(long)]
        role: Role,
    },
    /// Show the claims of the token the next request would carry
    Whoami,
    Get(ReadArgs),
    Delete(ReadArgs),
    Post(WriteArgs),
    Put(WriteArgs),
    Patch(WriteArgs),
}

#[derive(Args)]
pub struct ReadArgs {
    pub path: String,
    /// Query parameter as key=value, repeatable
    #[arg(long = "query", value_parser = parse_key_value)]
    pub query: Vec<(String, String)>,
}

#[derive(Args)]
pub struct WriteArgs {
    pub path: String,
    /// JSON request body
    #[arg(long)]
    pub data: Option<String>,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {}", raw))
}

pub async fn handle_command(cli: Cli) -> Result<()> {
    let mut config = ClientConfig::load()?;
    if let Some(store) = cli.store {
        config.storage_path = store;
    }

    let login_route = config.login_route.clone();
    let store = Arc::new(FileStore::open(&config.storage_path)?);
    let location = Location::default();
    let clients = ApiClients::from_config(config, store, Arc::new(location.clone()))?;
    if let Some(role) = cli.context {
        clients.auth.set_role_context(Some(role));
    }
    let session = Session::new(clients);

    let (method, path, body, request_config) = match cli.command {
        Command::Login {
            role,
            username,
            password,
        } => {
            session.login(role, &username, &password).await?;
            println!("Logged in as {}", role);
            return Ok(());
        }
        Command::Logout { role } => {
            session.logout(role)?;
            println!("Logged out {}", role);
            return Ok(());
        }
        Command::Whoami => return whoami(&session),
        Command::Get(args) => (Method::GET, args.path, None, query_config(args.query)),
        Command::Delete(args) => (Method::DELETE, args.path, None, query_config(args.query)),
        Command::Post(args) => (Method::POST, args.path, parse_body(args.data)?, None),
        Command::Put(args) => (Method::PUT, args.path, parse_body(args.data)?, None),
        Command::Patch(args) => (Method::PATCH, args.path, parse_body(args.data)?, None),
    };

    let clients = session.clients();
    let result = if cli.public {
        clients.public.request(method, &path, body, request_config).await
    } else {
        clients.auth.request(method, &path, body, request_config).await
    };

    if location.current_path() == login_route {
        app_log!(warn, "Session expired, please log in again");
    }

    let response = result.with_context(|| format!("Request to {} failed", path))?;
    print_response(&response)
}

fn whoami(session: &Session) -> Result<()> {
    let auth = &session.clients().auth;
    let token = auth
        .resolve_token()
        .context("No access token for the current role context")?;
    let claims = TokenClaims::decode_unverified(&token)?;

    println!("{}", serde_json::to_string_pretty(&claims)?);
    if let Some(expires_at) = claims.expires_at() {
        let state = if claims.is_expired(chrono::Utc::now()) {
            "expired"
        } else {
            "valid"
        };
        println!("expires {} ({})", expires_at.to_rfc3339(), state);
    }
    Ok(())
}

fn query_config(query: Vec<(String, String)>) -> Option<RequestConfig> {
    if query.is_empty() {
        None
    } else {
        Some(RequestConfig {
            query,
            ..RequestConfig::default()
        })
    }
}

fn parse_body(data: Option<String>) -> Result<Option<Value>> {
    data.map(|raw| serde_json::from_str(&raw).context("--data must be valid JSON"))
        .transpose()
}

fn print_response(response: &ApiResponse) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&response.json_value())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("search=rust dev").unwrap(),
            ("search".to_string(), "rust dev".to_string())
        );
        assert!(parse_key_value("missing").is_err());
    }

    #[test]
    fn test_cli_parses_verbs_and_globals() {
        let cli = Cli::try_parse_from([
            "jobboard", "get", "/api/jobs/", "--query", "page=2", "--context", "jobseeker",
        ])
        .unwrap();
        assert_eq!(cli.context, Some(Role::Jobseeker));
        match cli.command {
            Command::Get(args) => {
                assert_eq!(args.path, "/api/jobs/");
                assert_eq!(args.query, vec![("page".to_string(), "2".to_string())]);
            }
            _ => panic!("expected get"),
        }

        assert!(Cli::try_parse_from(["jobboard", "logout", "--role", "admin"]).is_err());
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(None).unwrap(), None);
        assert_eq!(
            parse_body(Some(r#"{"title":"Backend"}"#.to_string())).unwrap(),
            Some(serde_json::json!({"title": "Backend"}))
        );
        assert!(parse_body(Some("{".to_string())).is_err());
    }
}
