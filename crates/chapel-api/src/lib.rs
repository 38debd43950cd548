//! Async facade over the document store, plus the REST routes that expose it.
//!
//! Every facade call waits out the configured latency, then runs the store
//! operation on the blocking pool. Callers get the store's answer unchanged,
//! or an [`ApiError`].

pub mod auth;
pub mod content;
pub mod donations;
pub mod error;
pub mod members;
pub mod middleware;
pub mod notify;
pub mod routes;
pub mod system;

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::error;
use uuid::Uuid;

use chapel_db::otp::default_otp_ttl;
use chapel_db::{Database, Document, Setting, StoreResult};

pub use error::{ApiError, ApiResult};
pub use notify::{OtpNotifier, TracingNotifier};

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Artificial delay before every call.
    pub latency: Duration,
    /// Applied to the root account while it has no password, and again
    /// after a reset.
    pub root_password: Option<String>,
    pub otp_ttl: chrono::Duration,
    pub jwt_secret: String,
    pub token_days: i64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            latency: Duration::ZERO,
            root_password: None,
            otp_ttl: default_otp_ttl(),
            jwt_secret: "dev-secret-change-me".to_string(),
            token_days: 7,
        }
    }
}

#[derive(Clone)]
pub struct Api {
    inner: Arc<ApiInner>,
}

struct ApiInner {
    db: Database,
    config: ApiConfig,
    notifier: Arc<dyn OtpNotifier>,
}

impl Api {
    pub fn new(db: Database, config: ApiConfig) -> Self {
        Self::with_notifier(db, config, Arc::new(TracingNotifier))
    }

    pub fn with_notifier(db: Database, config: ApiConfig, notifier: Arc<dyn OtpNotifier>) -> Self {
        Self {
            inner: Arc::new(ApiInner { db, config, notifier }),
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// The protected admin account: neither demoted nor deleted. Fixed by
    /// the store when it was opened.
    pub fn root_email(&self) -> &str {
        self.inner.db.root_email()
    }

    // -- Resource groups --

    pub fn collection<T: Document>(&self) -> Resource<'_, T> {
        Resource::new(self)
    }

    pub fn news(&self) -> Resource<'_, chapel_types::models::NewsItem> {
        self.collection()
    }

    pub fn leaders(&self) -> Resource<'_, chapel_types::models::Leader> {
        self.collection()
    }

    pub fn announcements(&self) -> Resource<'_, chapel_types::models::Announcement> {
        self.collection()
    }

    pub fn departments(&self) -> Resource<'_, chapel_types::models::Department> {
        self.collection()
    }

    pub fn interests(&self) -> Resource<'_, chapel_types::models::DepartmentInterest> {
        self.collection()
    }

    pub fn donations(&self) -> Resource<'_, chapel_types::models::Donation> {
        self.collection()
    }

    pub fn contacts(&self) -> Resource<'_, chapel_types::models::ContactMessage> {
        self.collection()
    }

    pub fn verses(&self) -> Resource<'_, chapel_types::models::DailyVerse> {
        self.collection()
    }

    pub fn quizzes(&self) -> Resource<'_, chapel_types::models::BibleQuiz> {
        self.collection()
    }

    pub fn reflections(&self) -> Resource<'_, chapel_types::models::VerseReflection> {
        self.collection()
    }

    pub fn quiz_results(&self) -> Resource<'_, chapel_types::models::QuizResult> {
        self.collection()
    }

    pub fn settings<S: Setting>(&self) -> Settings<'_, S> {
        Settings::new(self)
    }

    pub fn home(&self) -> Settings<'_, chapel_types::models::HomeConfig> {
        self.settings()
    }

    pub fn about(&self) -> Settings<'_, chapel_types::models::AboutConfig> {
        self.settings()
    }

    pub fn members(&self) -> members::Members<'_> {
        members::Members::new(self)
    }

    pub fn auth(&self) -> auth::Auth<'_> {
        auth::Auth::new(self)
    }

    pub fn system(&self) -> system::System<'_> {
        system::System::new(self)
    }

    /// Wait out the artificial latency, then run `f` against the store off
    /// the async runtime.
    pub(crate) async fn run<F, R>(&self, f: F) -> ApiResult<R>
    where
        F: FnOnce(&Database) -> StoreResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let latency = self.inner.config.latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || f(&inner.db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Internal(e.to_string())
            })?
            .map_err(ApiError::from)
    }

    pub(crate) fn notifier(&self) -> &dyn OtpNotifier {
        self.inner.notifier.as_ref()
    }
}

/// CRUD namespace for one collection.
pub struct Resource<'a, T> {
    api: &'a Api,
    _kind: PhantomData<fn() -> T>,
}

impl<'a, T: Document> Resource<'a, T> {
    fn new(api: &'a Api) -> Self {
        Self {
            api,
            _kind: PhantomData,
        }
    }

    /// Most recent first.
    pub async fn list(&self) -> ApiResult<Vec<T>> {
        self.api.run(|db| db.list::<T>()).await
    }

    pub async fn get(&self, id: &str) -> ApiResult<Option<T>> {
        let id = id.to_string();
        self.api.run(move |db| db.get::<T>(&id)).await
    }

    /// Store a new record; an empty id is replaced with a fresh one.
    pub async fn create(&self, mut item: T) -> ApiResult<T> {
        if item.id().trim().is_empty() {
            item.set_id(Uuid::new_v4().to_string());
        }
        self.api.run(move |db| db.insert(item)).await
    }

    /// `None` when no record has this id.
    pub async fn update(&self, id: &str, patch: Map<String, Value>) -> ApiResult<Option<T>> {
        let id = id.to_string();
        self.api.run(move |db| db.update::<T>(&id, &patch)).await
    }

    pub async fn delete(&self, id: &str) -> ApiResult<bool> {
        let id = id.to_string();
        self.api.run(move |db| db.delete::<T>(&id)).await
    }
}

/// Get/merge namespace for one singleton setting.
pub struct Settings<'a, S> {
    api: &'a Api,
    _kind: PhantomData<fn() -> S>,
}

impl<'a, S: Setting> Settings<'a, S> {
    fn new(api: &'a Api) -> Self {
        Self {
            api,
            _kind: PhantomData,
        }
    }

    pub async fn get(&self) -> ApiResult<S> {
        self.api.run(|db| db.get_settings::<S>()).await
    }

    pub async fn merge(&self, patch: Map<String, Value>) -> ApiResult<S> {
        self.api.run(move |db| db.merge_settings::<S>(&patch)).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::notify::OtpNotifier;

    /// Captures delivered codes instead of logging them.
    #[derive(Default)]
    pub struct Outbox {
        pub sent: Mutex<Vec<(String, String)>>,
    }

    impl Outbox {
        pub fn last_code(&self) -> Option<String> {
            self.sent.lock().unwrap().last().map(|(_, code)| code.clone())
        }
    }

    impl OtpNotifier for Outbox {
        fn deliver(&self, email: &str, code: &str) {
            self.sent.lock().unwrap().push((email.to_string(), code.to_string()));
        }
    }

    pub fn api() -> (Api, Arc<Outbox>) {
        let outbox = Arc::new(Outbox::default());
        let db = Database::open_in_memory().unwrap();
        (Api::with_notifier(db, ApiConfig::default(), outbox.clone()), outbox)
    }
}
