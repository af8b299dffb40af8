mod auth;
mod credentials;
mod db;
mod live;
mod mail;
mod util;

pub mod rooms;

use std::sync::Arc;

pub use auth::*;
pub use credentials::*;
pub use db::*;
pub use live::*;
pub use mail::*;
pub use rooms::{Namespace, Presence, RoomRegistry};

use glitchd_core::Config;

/// The glitchd collaboration system: live rooms, login, and the mutations that feed the rooms.
pub struct Collab<Db> {
    database: Arc<Db>,

    pub rooms: RoomRegistry,
    pub auth: Auth<Db>,
    pub live: Live<Db>,
}

/// A type passed to various components of the collab system, to access state and publish updates.
pub struct CollabContext<Db> {
    pub database: Arc<Db>,
    pub rooms: RoomRegistry,
}

#[derive(Debug, Clone, Default)]
pub struct CollabConfig {
    pub rooms: Config,
    pub auth: AuthConfig,
}

impl<Db> Collab<Db>
where
    Db: Database,
{
    pub fn new<C, M>(database: Db, credentials: C, mailer: M, config: CollabConfig) -> Self
    where
        C: CredentialService + 'static,
        M: Mailer + 'static,
    {
        let context = CollabContext::new(database, &config.rooms);

        let auth = Auth::new(
            &context.database,
            Arc::new(credentials),
            Arc::new(mailer),
            config.auth,
        );

        Self {
            auth,
            live: Live::new(&context),
            database: context.database,
            rooms: context.rooms,
        }
    }

    pub fn database(&self) -> &Arc<Db> {
        &self.database
    }
}

impl<Db> CollabContext<Db> {
    pub fn new(database: Db, config: &Config) -> Self {
        Self {
            database: Arc::new(database),
            rooms: RoomRegistry::new(config),
        }
    }
}

impl<Db> Clone for CollabContext<Db> {
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            rooms: self.rooms.clone(),
        }
    }
}
