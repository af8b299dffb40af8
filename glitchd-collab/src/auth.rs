use chrono::{Duration, Utc};
use log::{error, info, warn};
use std::sync::Arc;
use thiserror::Error;

use crate::{
    util::{email_local_part, random_code},
    Claims, CredentialError, CredentialService, Database, DatabaseError, DatabaseResult,
    LoginTokenData, Mail, Mailer, NewChatIdentity, NewLoginToken, NewUser, PrimaryKey,
    SessionToken, Subject, UserData,
};

/// Passwordless authentication: one-time codes sent by mail, exchanged for session credentials.
pub struct Auth<Db> {
    db: Arc<Db>,
    credentials: Arc<dyn CredentialService>,
    mailer: Arc<dyn Mailer>,
    config: AuthConfig,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// No login token matches the user and code, or it was already used
    #[error("No such login token")]
    InvalidCode,
    /// The login token exists but is older than the configured lifetime
    #[error("Login token has expired")]
    CodeExpired,
    /// No account uses this email, and registration on login is disabled
    #[error("No account with this email")]
    UnknownEmail,
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Authorization must be Bearer")]
    MalformedAuthorization,
    #[error(transparent)]
    Credential(CredentialError),
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(DatabaseError),
}

/// What happens when someone requests a login for an email without an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistrationPolicy {
    /// Create the account on the fly
    #[default]
    AutoRegister,
    /// Refuse the login
    RejectUnknown,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub registration: RegistrationPolicy,
    /// How many characters a login code has
    pub code_length: usize,
    /// How long a login code stays usable. Codes never expire if this is `None`.
    pub login_token_ttl: Option<Duration>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            registration: RegistrationPolicy::default(),
            code_length: 6,
            login_token_ttl: None,
        }
    }
}

impl<Db> Auth<Db>
where
    Db: Database,
{
    pub fn new(
        db: &Arc<Db>,
        credentials: Arc<dyn CredentialService>,
        mailer: Arc<dyn Mailer>,
        config: AuthConfig,
    ) -> Self {
        Self {
            db: db.clone(),
            credentials,
            mailer,
            config,
        }
    }

    /// Sends a login code to the email, returning the id of the user it belongs to.
    pub async fn request_login(&self, email: &str) -> Result<PrimaryKey, AuthError> {
        let email = email.trim();

        let user = match self.db.user_by_email(email).await {
            Ok(user) => user,
            Err(DatabaseError::NotFound { .. }) => match self.config.registration {
                RegistrationPolicy::AutoRegister => self.register_by_email(email).await?,
                RegistrationPolicy::RejectUnknown => return Err(AuthError::UnknownEmail),
            },
            Err(e) => return Err(AuthError::Db(e)),
        };

        self.issue_login_token(&user).await?;

        Ok(user.id)
    }

    /// Creates an account, welcomes the user, and sends them a login code.
    pub async fn register(&self, new_account: NewAccount) -> Result<PrimaryKey, AuthError> {
        let email = new_account.email.trim();

        if email_local_part(email).is_none() {
            return Err(AuthError::InvalidEmail);
        }

        self.db
            .user_by_email(email)
            .await
            .conflict_or_ok("user", "email", email)
            .map_err(AuthError::Db)?;

        let user = self
            .db
            .create_user(NewUser {
                email: email.to_string(),
                username: new_account.username,
                name: Some(new_account.name.clone()),
            })
            .await
            .map_err(AuthError::Db)?;

        info!("Registered user {} ({})", user.username, user.id);

        if let Err(e) = self
            .mailer
            .send(Mail::welcome(&user.email, &new_account.name))
            .await
        {
            error!("Could not send welcome mail to {}: {}", user.email, e);
        }

        self.issue_login_token(&user).await?;

        Ok(user.id)
    }

    /// Exchanges a login code for a session credential. A code can only be exchanged once.
    pub async fn verify_login(&self, user_id: &str, code: &str) -> Result<SessionToken, AuthError> {
        let token = self
            .db
            .login_token(user_id, code)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => AuthError::InvalidCode,
                e => AuthError::Db(e),
            })?;

        if self.is_expired(&token) {
            if let Err(e) = self.db.delete_login_token(&token.id).await {
                warn!("Could not delete expired login token {}: {}", token.id, e);
            }

            return Err(AuthError::CodeExpired);
        }

        let user = self
            .db
            .user_by_id(&token.user_id)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => AuthError::InvalidCode,
                e => AuthError::Db(e),
            })?;

        let session = self
            .credentials
            .issue(&Subject {
                user_id: user.id.clone(),
                email: user.email.clone(),
            })
            .map_err(AuthError::Credential)?;

        match self.db.delete_login_token(&token.id).await {
            Ok(0) => {
                // Someone else consumed the token between our lookup and delete
                warn!("Login token {} for user {} was already used", token.id, user.id);
                Err(AuthError::InvalidCode)
            }
            Ok(_) => {
                info!("User {} logged in", user.id);
                self.ensure_chat_identity(&user).await;
                Ok(session)
            }
            Err(e) => {
                error!(
                    "Could not consume login token {} for user {}, it can be replayed: {}",
                    token.id, user.id, e
                );
                self.ensure_chat_identity(&user).await;
                Ok(session)
            }
        }
    }

    /// Validates an `Authorization` header value of the form `Bearer <credential>`
    pub fn authenticate(&self, authorization: &str) -> Result<Claims, AuthError> {
        let parts: Vec<_> = authorization.split_ascii_whitespace().collect();

        let token = match parts.as_slice() {
            ["Bearer", token] => *token,
            _ => return Err(AuthError::MalformedAuthorization),
        };

        self.validate(token)
    }

    /// Validates a session credential
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        self.credentials
            .validate(token)
            .map_err(AuthError::Credential)
    }

    async fn register_by_email(&self, email: &str) -> Result<UserData, AuthError> {
        let username = email_local_part(email).ok_or(AuthError::InvalidEmail)?;

        let result = self
            .db
            .create_user(NewUser {
                email: email.to_string(),
                username: username.to_string(),
                name: None,
            })
            .await;

        match result {
            Ok(user) => {
                info!("Registered user {} ({}) on login", user.username, user.id);
                Ok(user)
            }
            // Another login for the same email registered it first
            Err(DatabaseError::Conflict { .. }) => {
                self.db.user_by_email(email).await.map_err(AuthError::Db)
            }
            Err(e) => Err(AuthError::Db(e)),
        }
    }

    /// Stores a new login code for the user and mails it.
    /// Mail failures are logged, the stored code stays valid.
    async fn issue_login_token(&self, user: &UserData) -> Result<(), AuthError> {
        let code = random_code(self.config.code_length);

        self.db
            .create_login_token(NewLoginToken {
                user_id: user.id.clone(),
                token: code.clone(),
            })
            .await
            .map_err(AuthError::Db)?;

        info!("Issued login code for user {}", user.id);

        if let Err(e) = self.mailer.send(Mail::login_code(&user.email, &code)).await {
            error!("Could not deliver login code to {}: {}", user.email, e);
        }

        Ok(())
    }

    /// Gives the user the default chat identity if they don't have one yet.
    /// Failures are logged, they never fail a login.
    async fn ensure_chat_identity(&self, user: &UserData) {
        match self.db.chat_identity(&user.id).await {
            Ok(_) => {}
            Err(DatabaseError::NotFound { .. }) => {
                let result = self
                    .db
                    .upsert_chat_identity(&user.id, NewChatIdentity::default())
                    .await;

                if let Err(e) = result {
                    warn!("Could not create chat identity for user {}: {}", user.id, e);
                }
            }
            Err(e) => warn!("Could not load chat identity of user {}: {}", user.id, e),
        }
    }

    fn is_expired(&self, token: &LoginTokenData) -> bool {
        self.config
            .login_token_ttl
            .is_some_and(|ttl| token.created_at + ttl <= Utc::now())
    }
}

#[derive(Debug)]
pub struct NewAccount {
    pub email: String,
    pub username: String,
    pub name: String,
}
