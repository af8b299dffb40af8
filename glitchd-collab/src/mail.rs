use async_trait::async_trait;
use log::info;
use reqwest::{Client, StatusCode};
use serde_json::json;
use thiserror::Error;

/// A transactional email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl Mail {
    pub fn login_code(to: &str, code: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Glitchd Login Verification".to_string(),
            html: format!("<h3>Your login code is:</h3><br /><h1>{code}</h1>"),
            text: format!("Your login code is: {code}"),
        }
    }

    pub fn welcome(to: &str, name: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: "Welcome To Glitchd".to_string(),
            html: format!(
                "<h1>Welcome to Glitchd, {name}!</h1><h4>We are glad you could join us.</h4>"
            ),
            text: format!("Welcome to Glitchd, {name}!"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("Mail provider rejected the message with status {0}")]
    Rejected(StatusCode),
}

/// Delivers mail to an address
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: Mail) -> Result<(), MailError>;
}

#[async_trait]
impl<M> Mailer for Box<M>
where
    M: Mailer + ?Sized,
{
    async fn send(&self, mail: Mail) -> Result<(), MailError> {
        (**self).send(mail).await
    }
}

/// Sends mail through an HTTP email API
pub struct HttpMailer {
    client: Client,
    endpoint: String,
    api_key: String,
    /// The from address, e.g. `Glitchd <no-reply@glitchd.io>`
    sender: String,
}

impl HttpMailer {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.resend.com/emails";

    pub fn new(api_key: &str, sender: &str) -> Self {
        Self::with_endpoint(Self::DEFAULT_ENDPOINT, api_key, sender)
    }

    pub fn with_endpoint(endpoint: &str, api_key: &str, sender: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            sender: sender.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, mail: Mail) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.sender,
                "to": [mail.to],
                "subject": mail.subject,
                "html": mail.html,
                "text": mail.text,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Rejected(status));
        }

        info!("Sent \"{}\" to {}", mail.subject, mail.to);
        Ok(())
    }
}

/// Logs mail instead of sending it
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: Mail) -> Result<(), MailError> {
        info!("Mail to {}: {} | {}", mail.to, mail.subject, mail.text);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use wiremock::{
        matchers::{body_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    #[test]
    fn test_login_code_mail_contains_code() {
        let mail = Mail::login_code("a@b.com", "X7k2Qp");

        assert_eq!(mail.to, "a@b.com");
        assert_eq!(mail.subject, "Glitchd Login Verification");
        assert!(mail.html.contains("X7k2Qp"), "html body should contain the code");
        assert!(mail.text.contains("X7k2Qp"), "text body should contain the code");
    }

    #[tokio::test]
    async fn test_http_mailer_posts_json_with_bearer_key() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("authorization", "Bearer re_123"))
            .and(body_json(json!({
                "from": "Glitchd <no-reply@glitchd.io>",
                "to": ["a@b.com"],
                "subject": "Glitchd Login Verification",
                "html": "<h3>Your login code is:</h3><br /><h1>X7k2Qp</h1>",
                "text": "Your login code is: X7k2Qp",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "mail-1" })))
            .expect(1)
            .mount(&server)
            .await;

        let mailer = HttpMailer::with_endpoint(
            &format!("{}/emails", server.uri()),
            "re_123",
            "Glitchd <no-reply@glitchd.io>",
        );

        let result = mailer.send(Mail::login_code("a@b.com", "X7k2Qp")).await;
        assert!(result.is_ok(), "accepted mail should succeed: {:?}", result);
    }

    #[tokio::test]
    async fn test_http_mailer_reports_rejection() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(ResponseTemplate::new(422))
            .mount(&server)
            .await;

        let mailer = HttpMailer::with_endpoint(
            &format!("{}/emails", server.uri()),
            "re_123",
            "Glitchd <no-reply@glitchd.io>",
        );

        let result = mailer.send(Mail::welcome("a@b.com", "alice")).await;

        assert!(
            matches!(result, Err(MailError::Rejected(StatusCode::UNPROCESSABLE_ENTITY))),
            "non-success status should be a rejection"
        );
    }

    #[tokio::test]
    async fn test_boxed_mailer_forwards() {
        let mailer: Box<dyn Mailer> = Box::new(LogMailer);
        let result = mailer.send(Mail::welcome("a@b.com", "alice")).await;

        assert!(result.is_ok(), "log mailer never fails");
    }
}
