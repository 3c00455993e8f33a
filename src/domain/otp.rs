use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::config::OtpConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpKind {
    Initial,
    Resend,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpGrant {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OtpRejection {
    #[error("No OTP has been issued")]
    Missing,
    #[error("Invalid OTP")]
    Mismatch,
    #[error("OTP has expired")]
    Expired,
}

impl OtpKind {
    pub fn ttl(&self, config: &OtpConfig) -> Duration {
        match self {
            OtpKind::Initial => Duration::minutes(config.ttl_minutes),
            OtpKind::Resend => Duration::minutes(config.resend_ttl_minutes),
        }
    }
}

/// Six digit code drawn uniformly from `100000..=999999`.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(100_000..=999_999u32).to_string()
}

pub fn issue<R: Rng + ?Sized>(
    kind: OtpKind,
    config: &OtpConfig,
    now: DateTime<Utc>,
    rng: &mut R,
) -> OtpGrant {
    OtpGrant {
        code: generate_code(rng),
        expires_at: now + kind.ttl(config),
    }
}

pub fn verify(
    stored: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
    given: &str,
    now: DateTime<Utc>,
) -> Result<(), OtpRejection> {
    let (Some(stored), Some(expires_at)) = (stored, expires_at) else {
        return Err(OtpRejection::Missing);
    };
    if now > expires_at {
        return Err(OtpRejection::Expired);
    }
    if stored != given.trim() {
        return Err(OtpRejection::Mismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn codes_are_six_digits() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let code = generate_code(&mut rng);
            assert_eq!(code.len(), 6);
            let n: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&n));
        }
    }

    #[test]
    fn initial_and_resend_expiry_differ() {
        let config = OtpConfig::default();
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(1);

        let first = issue(OtpKind::Initial, &config, now, &mut rng);
        assert_eq!(first.expires_at, now + Duration::minutes(2));

        let again = issue(OtpKind::Resend, &config, now, &mut rng);
        assert_eq!(again.expires_at, now + Duration::minutes(5));
    }

    #[test]
    fn expiry_is_configurable() {
        let config = OtpConfig {
            ttl_minutes: 10,
            resend_ttl_minutes: 10,
        };
        assert_eq!(OtpKind::Initial.ttl(&config), Duration::minutes(10));
    }

    #[test]
    fn verify_checks_expiry_then_code() {
        let now = Utc::now();
        let expires = now + Duration::minutes(2);
        assert_eq!(verify(Some("123456"), Some(expires), "123456", now), Ok(()));
        assert_eq!(verify(Some("123456"), Some(expires), " 123456 ", expires), Ok(()));
        assert_eq!(
            verify(Some("123456"), Some(expires), "654321", now),
            Err(OtpRejection::Mismatch)
        );
        assert_eq!(
            verify(Some("123456"), Some(expires), "123456", expires + Duration::seconds(1)),
            Err(OtpRejection::Expired)
        );
        assert_eq!(verify(None, None, "123456", now), Err(OtpRejection::Missing));
    }
}
