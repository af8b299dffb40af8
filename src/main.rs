use std::time::Duration;

use colored::Colorize;
use glitchd_collab::{
    Collab, Database, DatabaseError, HttpMailer, JwtCredentials, LogMailer, Mailer,
    MemoryDatabase, PgDatabase,
};
use log::{debug, error, info, warn};
use settings::{Settings, SettingsError};
use thiserror::Error;
use tokio::runtime::{self, Runtime};

mod logging;
mod settings;

/// How often room statistics are logged
const STATS_INTERVAL: Duration = Duration::from_secs(60);

pub struct Glitchd {
    settings: Settings,
    runtime: Runtime,
}

#[derive(Debug, Error)]
enum GlitchdError {
    #[error("Invalid configuration: {0}")]
    Settings(#[from] SettingsError),

    #[error("Could not initialize database: {0}")]
    Database(#[from] DatabaseError),

    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Glitchd {
    fn new(settings: Settings) -> Result<Self, GlitchdError> {
        info!("Building async runtime...");
        let runtime = runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("glitchd-async")
            .build()
            .map_err(|e| GlitchdError::Fatal(e.to_string()))?;

        Ok(Self { settings, runtime })
    }

    fn run(self) -> Result<(), GlitchdError> {
        let settings = self.settings;

        self.runtime.block_on(async move {
            match &settings.database_url {
                Some(url) => {
                    info!("Connecting to database...");
                    let database = PgDatabase::new(url).await?;
                    launch(database, &settings).await
                }
                None => {
                    warn!("No database configured, data will only be kept in memory");
                    launch(MemoryDatabase::new(), &settings).await
                }
            }
        })
    }
}

async fn launch<Db>(database: Db, settings: &Settings) -> Result<(), GlitchdError>
where
    Db: Database + 'static,
{
    let mailer: Box<dyn Mailer> = match &settings.mail {
        Some(mail) => Box::new(HttpMailer::new(&mail.api_key, &mail.sender)),
        None => {
            warn!("No mail API key configured, login codes will be logged instead of sent");
            Box::new(LogMailer)
        }
    };

    let collab = Collab::new(
        database,
        JwtCredentials::new(settings.jwt_secret.as_bytes()),
        mailer,
        settings.collab_config(),
    );

    let rooms = collab.rooms.clone();
    let stats = tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATS_INTERVAL);

        loop {
            interval.tick().await;

            for stats in rooms.stats() {
                debug!(
                    "{}: {} rooms, {} observers",
                    stats.namespace, stats.rooms, stats.observers
                );
            }
        }
    });

    info!("Initialized successfully.");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| GlitchdError::Fatal(e.to_string()))?;

    info!("Shutting down...");
    stats.abort();

    Ok(())
}

impl GlitchdError {
    fn hint(&self) -> String {
        match self {
            GlitchdError::Settings(_) => "Check the GLITCHD_ environment variables, or the .env file in the working directory.".to_string(),
            GlitchdError::Database(_) => "This is a database error. Make sure GLITCHD_DATABASE_URL points to a running Postgres instance with the glitchd schema, then try again.".to_string(),
            GlitchdError::Fatal(_) => "This error is fatal, and should not happen.".to_string(),
        }
    }
}

fn report(error: GlitchdError) {
    error!("{} Read the error below to troubleshoot the issue. If you think this might be a bug, please report it by making a GitHub issue.", "Glitchd failed to start!".bold().red());
    error!("{}", error);
    error!("{}", format!("Hint: {}", error.hint()).dimmed().italic());
}

fn main() {
    dotenv::dotenv().ok();

    let settings = Settings::from_env();
    let verbose = settings.as_ref().map(|s| s.verbose).unwrap_or(false);

    if let Err(error) = logging::init_logger(verbose) {
        eprintln!("Could not initialize logging: {error}");
    }

    let result = settings
        .map_err(GlitchdError::from)
        .and_then(Glitchd::new)
        .and_then(Glitchd::run);

    if let Err(error) = result {
        report(error);
    }
}
