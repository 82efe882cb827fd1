use clap::Parser;

/// Task management backend with pluggable storage.
#[derive(Debug, Parser)]
#[command(name = "taskflow-server", version)]
pub struct Config {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Connection string for the store: `postgres://...` for the networked
    /// backend, `sqlite:...` for the embedded one. Defaults to an embedded
    /// database under the user's state directory.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
}

impl Config {
    pub fn database_url(&self) -> anyhow::Result<String> {
        if let Some(url) = &self.database_url {
            return Ok(url.clone());
        }

        let state_dir = dirs::state_dir()
            .or_else(dirs::config_dir)
            .or_else(|| dirs::home_dir().map(|h| h.join(".local/state")))
            .ok_or_else(|| anyhow::anyhow!("could not find a state directory"))?;

        let db_path = state_dir.join("taskflow").join("data");
        std::fs::create_dir_all(&db_path)?;

        let db_file = db_path.join("taskflow.db");
        Ok(format!("sqlite:{}?mode=rwc", db_file.display()))
    }
}
