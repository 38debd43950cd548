use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use anyhow::anyhow;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{info, warn};
use uuid::Uuid;

use chapel_db::{StoreError, StoreResult};
use chapel_types::ValidationError;
use chapel_types::api::{Claims, LoginResponse, RegisterRequest};
use chapel_types::models::{Member, Role};
use chapel_types::validate::normalize_email;

use crate::{Api, ApiError, ApiResult};

const MIN_PASSWORD_LEN: usize = 8;

/// Registration, login, session and password recovery.
pub struct Auth<'a> {
    api: &'a Api,
}

impl<'a> Auth<'a> {
    pub(crate) fn new(api: &'a Api) -> Self {
        Self { api }
    }

    /// Create a member account with the plain `member` role.
    pub async fn register(&self, req: RegisterRequest) -> ApiResult<Member> {
        check_password(&req.password)?;

        let member = Member {
            id: Uuid::new_v4().to_string(),
            full_name: req.full_name.trim().to_string(),
            email: normalize_email(&req.email),
            phone: req.phone,
            role: Role::Member,
            program: req.program,
            level: req.level,
            diocese: req.diocese,
            department: req.department,
            profile_image: None,
            created_at: chrono::Utc::now(),
        };
        let password = req.password;

        let created = self
            .api
            .run(move |db| {
                let hash = hash_password(&password)?;
                db.insert_member(member, Some(&hash))
            })
            .await?;

        info!("Registered member {}", created.id);
        Ok(created)
    }

    /// Check credentials, remember the signed-in profile and issue a token.
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<LoginResponse> {
        let email = email.to_string();
        let password = password.to_string();

        let member = self
            .api
            .run(move |db| {
                let Some(member) = db.find_member_by_email(&email)? else {
                    return Ok(None);
                };
                let Some(hash) = db.password_hash(&member.id)? else {
                    return Ok(None);
                };
                if !verify_password(&password, &hash) {
                    return Ok(None);
                }
                db.set_current_user(&member)?;
                Ok(Some(member))
            })
            .await?
            .ok_or_else(|| ApiError::Unauthorized("invalid email or password".to_string()))?;

        let token = self.issue_token(&member)?;
        Ok(LoginResponse { token, user: member })
    }

    /// Sign `member_id` out. The remembered profile is cleared only when it
    /// is theirs; returns whether it was.
    pub async fn logout(&self, member_id: &str) -> ApiResult<bool> {
        let member_id = member_id.to_string();
        self.api.run(move |db| db.clear_current_user_if(&member_id)).await
    }

    pub async fn current_user(&self) -> ApiResult<Option<Member>> {
        self.api.run(|db| db.current_user()).await
    }

    /// Issue a code and hand it to the notifier.
    pub async fn request_otp(&self, email: &str) -> ApiResult<()> {
        let email = normalize_email(email);
        if !email.contains('@') {
            return Err(ValidationError::new("email", "must be an email address").into());
        }

        let ttl = self.api.config().otp_ttl;
        let target = email.clone();
        let code = self.api.run(move |db| db.generate_otp(&target, ttl)).await?;
        self.api.notifier().deliver(&email, &code);
        Ok(())
    }

    pub async fn verify_otp(&self, email: &str, otp: &str) -> ApiResult<bool> {
        let email = email.to_string();
        let otp = otp.to_string();
        self.api.run(move |db| db.verify_otp(&email, &otp)).await
    }

    /// Consume a valid code and store the new password. Succeeds without
    /// change for emails that have no account.
    pub async fn reset_password(&self, email: &str, otp: &str, new_password: &str) -> ApiResult<()> {
        check_password(new_password)?;
        if !self.verify_otp(email, otp).await? {
            return Err(ApiError::Unauthorized("invalid or expired code".to_string()));
        }

        let email = email.to_string();
        let password = new_password.to_string();
        let updated = self
            .api
            .run(move |db| {
                let Some(member) = db.find_member_by_email(&email)? else {
                    return Ok(false);
                };
                db.set_password_hash(&member.id, &hash_password(&password)?)?;
                Ok(true)
            })
            .await?;

        if !updated {
            warn!("Password reset for an email with no account");
        }
        Ok(())
    }

    /// Give the root account a first password. Does nothing once the root
    /// account has credentials; returns whether a password was set.
    pub async fn bootstrap_root(&self, password: &str) -> ApiResult<bool> {
        check_password(password)?;
        let root_email = self.api.root_email().to_string();
        let password = password.to_string();

        let set = self
            .api
            .run(move |db| {
                let Some(root) = db.find_member_by_email(&root_email)? else {
                    return Ok(None);
                };
                if db.password_hash(&root.id)?.is_some() {
                    return Ok(Some(false));
                }
                db.set_password_hash(&root.id, &hash_password(&password)?)?;
                Ok(Some(true))
            })
            .await?
            .ok_or_else(|| ApiError::NotFound("root account".to_string()))?;

        if set {
            info!("Root account password initialised");
        }
        Ok(set)
    }

    pub fn issue_token(&self, member: &Member) -> ApiResult<String> {
        let config = self.api.config();
        let claims = Claims {
            sub: member.id.clone(),
            email: member.email.clone(),
            role: member.role,
            exp: (chrono::Utc::now() + chrono::Duration::days(config.token_days)).timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .map_err(|e| ApiError::Internal(format!("token encoding failed: {}", e)))
    }

    pub fn decode_token(&self, token: &str) -> ApiResult<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.api.config().jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|_| ApiError::Unauthorized("invalid or expired token".to_string()))
    }
}

fn check_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::new(
            "password",
            format!("must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

/// Argon2id hash in PHC string form.
pub(crate) fn hash_password(password: &str) -> StoreResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StoreError::Other(anyhow!("password hashing failed: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn registration(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            full_name: "  Abena Asante ".into(),
            email: email.into(),
            password: password.into(),
            phone: String::new(),
            program: String::new(),
            level: String::new(),
            diocese: String::new(),
            department: String::new(),
        }
    }

    #[tokio::test]
    async fn register_then_login_with_any_case() {
        let (api, _) = testing::api();
        let member = api.auth().register(registration("Abena@Uni.edu", "s3cret-pass")).await.unwrap();
        assert_eq!(member.email, "abena@uni.edu");
        assert_eq!(member.full_name, "Abena Asante");
        assert_eq!(member.role, Role::Member);

        let session = api.auth().login("ABENA@uni.edu ", "s3cret-pass").await.unwrap();
        assert_eq!(session.user.id, member.id);
        assert_eq!(api.auth().current_user().await.unwrap().unwrap().id, member.id);

        let claims = api.auth().decode_token(&session.token).unwrap();
        assert_eq!(claims.sub, member.id);
        assert_eq!(claims.role, Role::Member);

        assert!(!api.auth().logout("someone-else").await.unwrap());
        assert!(api.auth().current_user().await.unwrap().is_some());
        assert!(api.auth().logout(&member.id).await.unwrap());
        assert!(api.auth().current_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn wrong_password_and_short_password_are_rejected() {
        let (api, _) = testing::api();
        assert!(matches!(
            api.auth().register(registration("a@uni.edu", "short")).await,
            Err(ApiError::Validation(_))
        ));

        api.auth().register(registration("a@uni.edu", "long enough")).await.unwrap();
        assert!(matches!(
            api.auth().login("a@uni.edu", "not the one").await,
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            api.auth().login("nobody@uni.edu", "long enough").await,
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn password_reset_consumes_code() {
        let (api, outbox) = testing::api();
        api.auth().register(registration("a@uni.edu", "first password")).await.unwrap();

        api.auth().request_otp("A@uni.edu").await.unwrap();
        let code = outbox.last_code().unwrap();
        assert_eq!(code.len(), 6);

        api.auth().reset_password("a@uni.edu", &code, "second password").await.unwrap();
        assert!(api.auth().login("a@uni.edu", "second password").await.is_ok());
        assert!(api.auth().login("a@uni.edu", "first password").await.is_err());

        let reused = api.auth().reset_password("a@uni.edu", &code, "third password").await;
        assert!(matches!(reused, Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn reset_for_unknown_email_succeeds_quietly() {
        let (api, outbox) = testing::api();
        api.auth().request_otp("ghost@uni.edu").await.unwrap();
        let code = outbox.last_code().unwrap();
        api.auth().reset_password("ghost@uni.edu", &code, "whatever123").await.unwrap();
        assert!(api.members().find_by_email("ghost@uni.edu").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn otp_request_needs_an_address() {
        let (api, outbox) = testing::api();
        assert!(api.auth().request_otp("not-an-email").await.is_err());
        assert!(outbox.last_code().is_none());
    }

    #[tokio::test]
    async fn root_bootstrap_happens_once() {
        let (api, _) = testing::api();
        assert!(api.auth().bootstrap_root("root password").await.unwrap());
        assert!(!api.auth().bootstrap_root("other password").await.unwrap());

        let session = api.auth().login("admin@chapel.local", "root password").await.unwrap();
        assert_eq!(session.user.role, Role::Admin);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registrations_keep_one_account() {
        let (api, _) = testing::api();
        let attempts: Vec<_> = (0..4)
            .map(|_| {
                let api = api.clone();
                tokio::spawn(async move { api.auth().register(registration("race@uni.edu", "race password")).await })
            })
            .collect();

        let mut created = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => created += 1,
                Err(e) => assert!(matches!(e, ApiError::Conflict(_)), "{e}"),
            }
        }
        assert_eq!(created, 1);

        let members = api.members().list().await.unwrap();
        assert_eq!(members.iter().filter(|m| m.email == "race@uni.edu").count(), 1);
        assert!(api.auth().login("race@uni.edu", "race password").await.is_ok());
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let (api, _) = testing::api();
        assert!(matches!(api.auth().decode_token("abc.def.ghi"), Err(ApiError::Unauthorized(_))));
    }
}
