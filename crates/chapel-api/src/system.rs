use tracing::warn;

use chapel_types::api::{ActivityEntry, HealthReport};

use crate::{Api, ApiResult};

/// Store health, the activity log and the factory reset.
pub struct System<'a> {
    api: &'a Api,
}

impl<'a> System<'a> {
    pub(crate) fn new(api: &'a Api) -> Self {
        Self { api }
    }

    pub async fn health(&self) -> ApiResult<HealthReport> {
        self.api.run(|db| db.health()).await
    }

    /// Recent mutations, oldest first.
    pub async fn logs(&self) -> ApiResult<Vec<ActivityEntry>> {
        self.api.run(|db| db.activity_log()).await
    }

    /// Drop all data, accounts included, and reseed the defaults. The root
    /// account gets the configured root password back, if there is one;
    /// otherwise it signs in only after a password reset.
    pub async fn reset(&self) -> ApiResult<()> {
        warn!("Resetting all data to defaults");
        self.api.run(|db| db.reset()).await?;

        match &self.api.config().root_password {
            Some(password) => {
                if let Err(e) = self.api.auth().bootstrap_root(password).await {
                    warn!("Root account not initialised after reset: {}", e);
                }
            }
            None => warn!("No root password configured; root must reset its password to sign in"),
        }
        Ok(())
    }
}
