use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use nightwatcher::config::{AuthConfig, AuthStrategy};

#[derive(Debug, Parser)]
#[command(name = "nightwatcher-server", version, about = "NightWatcher reading ingestion service")]
pub struct Args {
    #[arg(long, env = "NIGHTWATCHER_LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    #[arg(long, env = "NIGHTWATCHER_DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub db_max_connections: u32,

    #[arg(long, env = "NIGHTWATCHER_AUTH", value_enum, default_value = "shared-secret")]
    pub auth: AuthStrategy,

    #[arg(long, env = "NIGHTWATCHER_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "NIGHTWATCHER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// `username: ...` / `password: ...` file, re-read on SIGHUP.
    #[arg(long, env = "NIGHTWATCHER_CREDENTIALS_FILE")]
    pub credentials_file: Option<PathBuf>,
}

impl Args {
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            strategy: self.auth,
            username: self.username.clone(),
            password: self.password.clone(),
            credentials_file: self.credentials_file.clone(),
        }
    }
}
