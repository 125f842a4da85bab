use anyhow::Context as _;
use aquaserv_client_core::{
    get_configuration, get_configuration_from, ApiRequest, Client, ClientConfig, FileStorage,
    LoginOutcome, SessionEvent,
};
use aquaserv_shared::{
    id::UserId,
    req_args::{LoginReqArgs, RegisterReqArgs},
    uac::{PermissionKey, PermissionSet},
};
use std::{path::PathBuf, sync::Arc};
use tracing::info;

use crate::cli::{Cli, Command};

/// Used when the configuration does not say where to keep the session
pub const DEFAULT_SESSION_FILE: &str = "aquaserv_session.json";

pub fn create_runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("unable to create runtime")
}

#[tracing::instrument(skip_all)]
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config_dir {
        Some(dir) => get_configuration_from(dir),
        None => get_configuration(),
    }
    .context("failed to load configuration")?;
    let client = build_client(&config)?;
    client.set_session_listener(|event| {
        if event == SessionEvent::SessionExpired {
            eprintln!("Your session has expired, please sign in again");
        }
    });
    execute(&client, cli.command).await
}

fn session_file(config: &ClientConfig) -> PathBuf {
    config
        .session_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SESSION_FILE))
}

fn build_client(config: &ClientConfig) -> anyhow::Result<Client> {
    let path = session_file(config);
    info!(?path, base_url = %config.base_url, "using session file");
    Client::new(config, Arc::new(FileStorage::new(path)))
}

async fn execute(client: &Client, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login { email, password } => {
            let outcome = client
                .login(&LoginReqArgs::new(email, password.into()))
                .await?;
            report_login(client, outcome);
        }
        Command::Register {
            name,
            email,
            password,
            phone,
        } => {
            let args = RegisterReqArgs::new(name, email, password.into())
                .context("invalid registration details")?
                .phone(phone);
            let outcome = client.register(&args).await?;
            report_login(client, outcome);
        }
        Command::Logout => {
            if let Err(e) = client.logout().await {
                eprintln!("Signed out locally but the server was not told: {e}");
            }
            println!("Signed out");
        }
        Command::Whoami => match client.user_info() {
            Some(user) => {
                println!("{} ({})", user.name, user.id);
                if let Some(email) = user.email {
                    println!("email: {email}");
                }
                if let Some(role) = user.role {
                    println!("role: {role}");
                }
            }
            None => println!("Not signed in"),
        },
        Command::Permissions { reload } => {
            let permissions = if reload {
                client.resolve_permissions().await
            } else {
                client.permissions()
            };
            print_permissions(&permissions);
        }
        Command::UserPermissions { user_id } => {
            let user_id = parse_user_id(user_id)?;
            let result = client.get_user_permissions(&user_id).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::TogglePermission { user_id, key } => {
            let user_id = parse_user_id(user_id)?;
            let key = PermissionKey::from(key);
            let result = client.toggle_user_permission(&user_id, &key).await?;
            let state = if result.effective_permissions.contains_key(&key) {
                "on"
            } else {
                "off"
            };
            println!("{key} is now {state} for {user_id}");
        }
        Command::Get { path } => {
            let response = client.send(ApiRequest::get(path)).await?;
            print_body(&response.body);
        }
        Command::Health => {
            client.health_check().await?;
            println!("Server is up");
        }
    }
    Ok(())
}

fn parse_user_id(value: String) -> anyhow::Result<UserId> {
    UserId::try_from(value).context("invalid user id")
}

fn report_login(client: &Client, outcome: LoginOutcome) {
    if let Some(user) = client.user_info() {
        println!("Signed in as {}", user.name);
    }
    if !outcome.is_permissions_loaded() {
        eprintln!("Permissions could not be loaded, continuing without any");
    }
}

fn print_permissions(permissions: &PermissionSet) {
    if permissions.is_empty() {
        println!("No permissions");
    }
    for key in permissions.iter() {
        println!("{key}");
    }
}

/// Pretty prints JSON bodies and prints anything else as is
fn print_body(body: &str) {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(pretty) => println!("{pretty}"),
            Err(_) => println!("{body}"),
        },
        Err(_) => println!("{body}"),
    }
}
