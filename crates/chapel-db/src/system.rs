use chrono::Utc;
use tracing::{info, warn};

use chapel_types::api::HealthReport;

use crate::documents::{Collection, SETTING_KEYS};
use crate::queries::log_activity;
use crate::{Database, StoreResult, seed};

impl Database {
    /// Snapshot of the store: reachability, stored size and collection count.
    pub fn health(&self) -> StoreResult<HealthReport> {
        let probe = self.with_conn(|conn| {
            let bytes: i64 = conn.query_row(
                "SELECT
                    (SELECT COALESCE(SUM(LENGTH(body)), 0) FROM documents) +
                    (SELECT COALESCE(SUM(LENGTH(body)), 0) FROM settings)",
                [],
                |row| row.get(0),
            )?;
            Ok(bytes)
        });

        let (status, bytes) = match probe {
            Ok(bytes) => ("connected", bytes),
            Err(e) => {
                warn!("Health probe failed: {}", e);
                ("disconnected", 0)
            }
        };

        Ok(HealthReport {
            status: status.to_string(),
            size_kb: (bytes as f64 / 1024.0 * 100.0).round() / 100.0,
            collections: Collection::ALL.len() + SETTING_KEYS.len(),
            timestamp: Utc::now(),
        })
    }

    /// Wipe every record, setting, log entry, code and session, then reseed defaults.
    pub fn reset(&self) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute_batch(
                "
                DELETE FROM documents;
                DELETE FROM settings;
                DELETE FROM activity_log;
                DELETE FROM otps;
                DELETE FROM seeded_collections;
                DELETE FROM credentials;
                DELETE FROM session;
                ",
            )?;
            seed::run(&tx, &self.root_email)?;
            log_activity(&tx, "Database reset to defaults")?;
            tx.commit()?;
            Ok(())
        })?;

        info!("Database reset to defaults");
        Ok(())
    }
}
