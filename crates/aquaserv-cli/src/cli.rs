use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[arg(
        short = 's',
        long = "stdout",
        action,
        help = "Controls if it logs to stdout/stderr instead of to a file"
    )]
    pub is_to_std_out: bool,

    /// Folder holding `base.toml` and the per environment overrides. Defaults
    /// to `configuration` in the current folder
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in and keep the session for later commands
    Login {
        email: String,
        #[arg(long, env = "AQUASERV_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in as the new user
    Register {
        name: String,
        email: String,
        #[arg(long, env = "AQUASERV_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        phone: Option<String>,
    },
    Logout,
    /// Show the signed in user
    Whoami,
    /// List the permissions of the signed in user
    Permissions {
        /// Ask the server again instead of using the stored permissions
        #[arg(long, action)]
        reload: bool,
    },
    /// Show the role permissions and overrides of another user
    UserPermissions { user_id: String },
    /// Turn a single permission on or off for a user
    TogglePermission { user_id: String, key: String },
    /// Send an authenticated GET and print the response body
    Get { path: String },
    Health,
}
