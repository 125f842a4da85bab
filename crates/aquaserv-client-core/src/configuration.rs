use anyhow::Context as _;
use aquaserv_shared::const_config::client::CLIENT_DEFAULT_REQUEST_TIMEOUT_SECS;
use serde_aux::field_attributes::deserialize_number_from_string;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ClientConfig {
    /// Address of the backend including the scheme, for example
    /// `https://api.example.com`
    pub base_url: String,
    #[serde(
        default = "default_request_timeout_secs",
        deserialize_with = "deserialize_number_from_string"
    )]
    pub request_timeout_secs: u64,
    /// Where to persist the session. Only used by front ends that store the
    /// session on disk
    #[serde(default)]
    pub session_file: Option<PathBuf>,
}

fn default_request_timeout_secs() -> u64 {
    CLIENT_DEFAULT_REQUEST_TIMEOUT_SECS
}

impl ClientConfig {
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout_secs: CLIENT_DEFAULT_REQUEST_TIMEOUT_SECS,
            session_file: None,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Loads the configuration from the `configuration` folder in the current
/// directory. See [`get_configuration_from`]
pub fn get_configuration() -> anyhow::Result<ClientConfig> {
    let base_path = std::env::current_dir().context("failed to determine the current directory")?;
    get_configuration_from(&base_path.join("configuration"))
}

/// Layers `base.toml`, then `{APP_ENVIRONMENT}.toml` and finally environment
/// variables prefixed with `APP_`
pub fn get_configuration_from(configuration_directory: &Path) -> anyhow::Result<ClientConfig> {
    // Detect the running environment.
    // Default to `local` if unspecified.
    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(|e: String| anyhow::anyhow!(e))
        .context("failed to parse APP_ENVIRONMENT")?;
    let environment_filename = format!("{}.toml", environment.as_str());
    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.toml"),
        ))
        .add_source(
            config::File::from(configuration_directory.join(environment_filename))
                .required(false),
        )
        // Add in settings from environment variables (with a prefix of APP and '__' as separator)
        // E.g. `APP_CLIENT__BASE_URL=http://localhost:8000` would set `ClientConfig.base_url`
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .context("failed to build configuration")?;

    settings
        .get::<ClientConfig>("client")
        .context("failed to deserialize client configuration")
}

/// The possible runtime environment for our application.
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{other} is not a supported environment. Use either `local` or `production`."
            )),
        }
    }
}
