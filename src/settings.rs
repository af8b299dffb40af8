use std::{env, str::FromStr};

use chrono::Duration;
use glitchd_collab::{AuthConfig, CollabConfig, RegistrationPolicy};
use glitchd_core::Config;
use thiserror::Error;

const DEFAULT_SENDER: &str = "Glitchd <no-reply@glitchd.io>";

/// Everything glitchd reads from the environment
#[derive(Debug, Clone)]
pub struct Settings {
    pub jwt_secret: String,
    /// Postgres connection string. An in-memory database is used without one.
    pub database_url: Option<String>,
    /// Mail is only logged without these
    pub mail: Option<MailSettings>,
    pub registration: RegistrationPolicy,
    pub observer_capacity: usize,
    pub login_token_ttl: Option<Duration>,
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub api_key: String,
    pub sender: String,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} has an invalid value \"{value}\"")]
    Invalid { name: &'static str, value: String },
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());

        let jwt_secret =
            var("GLITCHD_JWT_SECRET").ok_or(SettingsError::Missing("GLITCHD_JWT_SECRET"))?;

        let mail = var("GLITCHD_MAIL_API_KEY").map(|api_key| MailSettings {
            api_key,
            sender: var("GLITCHD_MAIL_SENDER").unwrap_or_else(|| DEFAULT_SENDER.to_string()),
        });

        let registration = match var("GLITCHD_REGISTRATION").as_deref() {
            None | Some("auto") => RegistrationPolicy::AutoRegister,
            Some("closed") => RegistrationPolicy::RejectUnknown,
            Some(other) => {
                return Err(SettingsError::Invalid {
                    name: "GLITCHD_REGISTRATION",
                    value: other.to_string(),
                })
            }
        };

        let observer_capacity = parse(&var, "GLITCHD_OBSERVER_CAPACITY")?
            .unwrap_or(Config::DEFAULT_OBSERVER_CAPACITY);

        let login_token_ttl =
            parse::<i64, _>(&var, "GLITCHD_LOGIN_CODE_TTL_MINUTES")?.map(Duration::minutes);

        let verbose = parse(&var, "GLITCHD_VERBOSE")?.unwrap_or(false);

        Ok(Self {
            jwt_secret,
            database_url: var("GLITCHD_DATABASE_URL"),
            mail,
            registration,
            observer_capacity,
            login_token_ttl,
            verbose,
        })
    }

    pub fn collab_config(&self) -> CollabConfig {
        CollabConfig {
            rooms: Config {
                observer_capacity: self.observer_capacity,
            },
            auth: AuthConfig {
                registration: self.registration,
                login_token_ttl: self.login_token_ttl,
                ..Default::default()
            },
        }
    }
}

fn parse<T, F>(var: &F, name: &'static str) -> Result<Option<T>, SettingsError>
where
    T: FromStr,
    F: Fn(&'static str) -> Option<String>,
{
    var(name)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| SettingsError::Invalid { name, value })
        })
        .transpose()
}
