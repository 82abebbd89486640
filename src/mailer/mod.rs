/// Abnormal-access alert mail
///
/// Sent when a refresh token that does not match the last one issued is
/// presented. The mail carries a re-activation link with a one-time code; the
/// code is returned to the caller so it can be stored on the account.
use crate::{
    config::EmailConfig,
    db::account::Account,
    error::{ServiceError, ServiceResult},
};
use async_trait::async_trait;
use chrono::Utc;
use lettre::{
    message::{header::ContentType, Message},
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use rand::{seq::SliceRandom, Rng};

/// Default verification code length
pub const VERIFICATION_CODE_LENGTH: usize = 8;

const MIN_CODE_LENGTH: usize = 6;
const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const SPECIALS: &[u8] = b"!@#$%^&*+=?/";

/// Delivers abnormal-access alerts
#[async_trait]
pub trait AbnormalAccessNotifier: Send + Sync {
    /// Alert the account owner and return the verification code that was sent
    async fn notify(&self, account: &Account, client_ip: Option<&str>) -> ServiceResult<String>;
}

/// Generate a verification code with at least one special character.
///
/// Lengths below the minimum are raised to it.
pub fn generate_verification_code(length: usize) -> String {
    let length = length.max(MIN_CODE_LENGTH);
    let mut rng = rand::thread_rng();

    let mut code: Vec<u8> = Vec::with_capacity(length);
    code.push(SPECIALS[rng.gen_range(0..SPECIALS.len())]);
    for _ in 1..length {
        let pick = rng.gen_range(0..ALPHANUMERIC.len() + SPECIALS.len());
        let byte = if pick < ALPHANUMERIC.len() {
            ALPHANUMERIC[pick]
        } else {
            SPECIALS[pick - ALPHANUMERIC.len()]
        };
        code.push(byte);
    }
    code.shuffle(&mut rng);

    code.into_iter().map(char::from).collect()
}

/// Link the account owner follows to re-activate the account
pub fn verification_url(server_uri: &str, user_id: &str, code: &str) -> String {
    format!(
        "{}/api/auth/verify?userId={}&code={}",
        server_uri.trim_end_matches('/'),
        urlencoding::encode(user_id),
        urlencoding::encode(code)
    )
}

/// SMTP mailer
#[derive(Clone)]
pub struct Mailer {
    config: Option<EmailConfig>,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    server_uri: String,
}

impl Mailer {
    /// Create a new mailer. Without an email config, alerts are logged and skipped.
    pub fn new(config: Option<EmailConfig>, server_uri: impl Into<String>) -> ServiceResult<Self> {
        let transport = match &config {
            Some(email) => {
                if !email.smtp_url.starts_with("smtp://") && !email.smtp_url.starts_with("smtps://")
                {
                    return Err(ServiceError::Validation(
                        "SMTP URL must start with smtp:// or smtps://".to_string(),
                    ));
                }

                let transport = AsyncSmtpTransport::<Tokio1Executor>::from_url(&email.smtp_url)
                    .map_err(|e| ServiceError::Internal(format!("SMTP setup failed: {}", e)))?
                    .build();
                Some(transport)
            }
            None => None,
        };

        Ok(Self {
            config,
            transport,
            server_uri: server_uri.into(),
        })
    }

    /// Check if email is configured
    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    fn abnormal_access_body(&self, account: &Account, client_ip: Option<&str>, code: &str) -> String {
        format!(
            r#"
Hello {},

An abnormal access to your account was detected and the account has been locked.

Time:       {}
IP address: {}

If this was not you, re-activate your account by following the link below
and confirming your password:

{}

Best regards,
Session Keeper
"#,
            account.name,
            Utc::now().format("%Y-%m-%d %I:%M %p UTC"),
            client_ip.unwrap_or("unknown"),
            verification_url(&self.server_uri, &account.user_id, code)
        )
    }

    async fn send_email(&self, to: &str, subject: &str, body: String) -> ServiceResult<()> {
        let (Some(config), Some(transport)) = (&self.config, &self.transport) else {
            tracing::warn!("Email transport not configured, skipping mail to {}", to);
            return Ok(());
        };

        let email = Message::builder()
            .from(
                config
                    .from_address
                    .parse()
                    .map_err(|e| ServiceError::Internal(format!("Invalid from address: {}", e)))?,
            )
            .to(to
                .parse()
                .map_err(|e| ServiceError::Internal(format!("Invalid to address: {}", e)))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| ServiceError::Internal(format!("Failed to build email: {}", e)))?;

        transport
            .send(email)
            .await
            .map_err(|e| ServiceError::Internal(format!("Failed to send email: {}", e)))?;

        tracing::info!("Sent email to {}: {}", to, subject);
        Ok(())
    }
}

#[async_trait]
impl AbnormalAccessNotifier for Mailer {
    async fn notify(&self, account: &Account, client_ip: Option<&str>) -> ServiceResult<String> {
        let code = generate_verification_code(VERIFICATION_CODE_LENGTH);
        let subject = format!("Abnormal access detected on {}'s account", account.name);
        let body = self.abnormal_access_body(account, client_ip, &code);

        self.send_email(&account.email, &subject, body).await?;
        Ok(code)
    }
}
