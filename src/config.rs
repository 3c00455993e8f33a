use std::{env, path::PathBuf, time::Duration};

use anyhow::{Context, bail};

use crate::domain::status::TransitionPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailTransportKind {
    Brevo,
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStorageKind {
    Cloudinary,
    ImageKit,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub transport: MailTransportKind,
    pub brevo_api_key: Option<String>,
    pub sender_name: String,
    pub sender_email: String,
    pub orders_sender_name: String,
    pub admin_email: String,
    pub timeout: Duration,
    pub welcome_image_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub storage: ImageStorageKind,
    pub cloudinary_cloud_name: Option<String>,
    pub cloudinary_api_key: Option<String>,
    pub cloudinary_api_secret: Option<String>,
    pub imagekit_private_key: Option<String>,
    pub timeout: Duration,
    pub temp_dir: PathBuf,
}

#[derive(Debug, Clone, Copy)]
pub struct OtpConfig {
    pub ttl_minutes: i64,
    pub resend_ttl_minutes: i64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: 2,
            resend_ttl_minutes: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub production: bool,
    pub jwt_secret: String,
    pub mail: MailConfig,
    pub images: ImageConfig,
    pub otp: OtpConfig,
    pub transition_policy: TransitionPolicy,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(5000);
        let production = env::var("APP_ENV").is_ok_and(|v| v == "production");
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;

        let transport = match env_or("MAIL_TRANSPORT", "log").as_str() {
            "brevo" => MailTransportKind::Brevo,
            "log" => MailTransportKind::Log,
            other => bail!("unknown MAIL_TRANSPORT {other}"),
        };
        let brevo_api_key = env::var("BREVO_API_KEY").ok();
        if transport == MailTransportKind::Brevo && brevo_api_key.is_none() {
            bail!("BREVO_API_KEY is required when MAIL_TRANSPORT=brevo");
        }
        let mail = MailConfig {
            transport,
            brevo_api_key,
            sender_name: env_or("MAIL_SENDER_NAME", "Steth"),
            sender_email: env_or("MAIL_SENDER_EMAIL", "stethhelp@gmail.com"),
            orders_sender_name: env_or("MAIL_ORDERS_SENDER_NAME", "Steth Orders"),
            admin_email: env::var("EMAIL_ADMIN").context("EMAIL_ADMIN is not set")?,
            timeout: Duration::from_secs(parse_or("MAIL_TIMEOUT_SECS", 30)),
            welcome_image_path: PathBuf::from(env_or("WELCOME_IMAGE_PATH", "images/welcome.jpeg")),
        };

        let storage = match env_or("IMAGE_STORAGE", "cloudinary").as_str() {
            "cloudinary" => ImageStorageKind::Cloudinary,
            "imagekit" => ImageStorageKind::ImageKit,
            other => bail!("unknown IMAGE_STORAGE {other}"),
        };
        let images = ImageConfig {
            storage,
            cloudinary_cloud_name: env::var("CLOUDINARY_CLOUD_NAME").ok(),
            cloudinary_api_key: env::var("CLOUDINARY_API_KEY").ok(),
            cloudinary_api_secret: env::var("CLOUDINARY_API_SECRET").ok(),
            imagekit_private_key: env::var("IMAGEKIT_PRIVATE_KEY").ok(),
            timeout: Duration::from_secs(parse_or("IMAGE_UPLOAD_TIMEOUT_SECS", 120)),
            temp_dir: PathBuf::from(env_or("UPLOAD_TEMP_DIR", "temp")),
        };

        let defaults = OtpConfig::default();
        let otp = OtpConfig {
            ttl_minutes: parse_or("OTP_TTL_MINUTES", defaults.ttl_minutes),
            resend_ttl_minutes: parse_or("OTP_RESEND_TTL_MINUTES", defaults.resend_ttl_minutes),
        };

        let transition_policy = match env_or("ORDER_TRANSITION_POLICY", "strict").as_str() {
            "strict" => TransitionPolicy::Strict,
            "permissive" => TransitionPolicy::Permissive,
            other => bail!("unknown ORDER_TRANSITION_POLICY {other}"),
        };

        Ok(Self {
            port,
            database_url,
            host,
            production,
            jwt_secret,
            mail,
            images,
            otp,
            transition_policy,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
