use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rusqlite::{Connection, OptionalExtension};

use chapel_types::validate::normalize_email;

use crate::queries::log_activity;
use crate::{Database, StoreResult};

/// How long a one-time password stays valid, in minutes.
pub const DEFAULT_OTP_TTL_MINUTES: i64 = 10;

pub fn default_otp_ttl() -> Duration {
    Duration::minutes(DEFAULT_OTP_TTL_MINUTES)
}

impl Database {
    /// Issue a six-digit code for `email`. Earlier codes for the same email
    /// stay valid until they expire or one of them is used.
    pub fn generate_otp(&self, email: &str, ttl: Duration) -> StoreResult<String> {
        self.generate_otp_at(email, ttl, Utc::now())
    }

    pub fn generate_otp_at(&self, email: &str, ttl: Duration, now: DateTime<Utc>) -> StoreResult<String> {
        let email = normalize_email(email);
        let code = format!("{:06}", rand::rng().random_range(0..1_000_000u32));
        let expires_at = (now + ttl).timestamp_millis();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            purge_expired(&tx, now)?;
            tx.execute(
                "INSERT INTO otps (email, code, expires_at) VALUES (?1, ?2, ?3)",
                (&email, &code, expires_at),
            )?;
            log_activity(&tx, &format!("Generated OTP for {}", email))?;
            tx.commit()?;
            Ok(code)
        })
    }

    /// True when `code` matches an unexpired code for `email`. A matching code
    /// is consumed and cannot be used again.
    pub fn verify_otp(&self, email: &str, code: &str) -> StoreResult<bool> {
        self.verify_otp_at(email, code, Utc::now())
    }

    pub fn verify_otp_at(&self, email: &str, code: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        let email = normalize_email(email);
        let code = code.trim();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            purge_expired(&tx, now)?;

            let row: Option<i64> = tx
                .query_row(
                    "SELECT id FROM otps WHERE email = ?1 AND code = ?2 LIMIT 1",
                    (&email, code),
                    |row| row.get(0),
                )
                .optional()?;

            let Some(id) = row else {
                tx.commit()?;
                return Ok(false);
            };

            tx.execute("DELETE FROM otps WHERE id = ?1", [id])?;
            log_activity(&tx, &format!("Verified OTP for {}", email))?;
            tx.commit()?;
            Ok(true)
        })
    }
}

fn purge_expired(conn: &Connection, now: DateTime<Utc>) -> StoreResult<()> {
    conn.execute("DELETE FROM otps WHERE expires_at <= ?1", [now.timestamp_millis()])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_single_use() {
        let db = Database::open_in_memory().unwrap();
        let code = db.generate_otp("Member@Uni.edu", default_otp_ttl()).unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));

        assert!(db.verify_otp("member@uni.edu", &code).unwrap());
        assert!(!db.verify_otp("member@uni.edu", &code).unwrap());
    }

    #[test]
    fn wrong_code_or_email_rejected() {
        let db = Database::open_in_memory().unwrap();
        let code = db.generate_otp("a@uni.edu", default_otp_ttl()).unwrap();
        let wrong = if code == "000000" { "000001" } else { "000000" };

        assert!(!db.verify_otp("a@uni.edu", wrong).unwrap());
        assert!(!db.verify_otp("b@uni.edu", &code).unwrap());
        assert!(db.verify_otp("a@uni.edu", &code).unwrap());
    }

    #[test]
    fn expired_code_rejected() {
        let db = Database::open_in_memory().unwrap();
        let issued = Utc::now();
        let code = db.generate_otp_at("a@uni.edu", default_otp_ttl(), issued).unwrap();

        let later = issued + default_otp_ttl() + Duration::seconds(1);
        assert!(!db.verify_otp_at("a@uni.edu", &code, later).unwrap());
        // Purged, so it stays invalid even inside the original window.
        assert!(!db.verify_otp_at("a@uni.edu", &code, issued).unwrap());
    }

    #[test]
    fn valid_until_the_window_closes() {
        let db = Database::open_in_memory().unwrap();
        let issued = Utc::now();
        let code = db.generate_otp_at("a@uni.edu", default_otp_ttl(), issued).unwrap();

        let almost = issued + default_otp_ttl() - Duration::seconds(1);
        assert!(db.verify_otp_at("a@uni.edu", &code, almost).unwrap());
    }
}
