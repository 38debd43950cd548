use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use chapel_db::commands::Confirmation;
use chapel_types::api::{DonationSummary, ProjectProgress};
use chapel_types::models::{Donation, DonationProject, DonationStatus};

use crate::{ApiResult, Resource};

impl<'a> Resource<'a, Donation> {
    /// Newest donation date first.
    pub async fn list_recent(&self) -> ApiResult<Vec<Donation>> {
        let mut items = self.list().await?;
        items.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(items)
    }

    /// Record a donation from the public form. It starts Pending and
    /// uncredited, whatever the client sent.
    pub async fn submit(&self, mut donation: Donation) -> ApiResult<Donation> {
        if donation.id.trim().is_empty() {
            donation.id = Uuid::new_v4().to_string();
        }
        if donation.transaction_id.trim().is_empty() {
            donation.transaction_id = format!("TXN-{}", Uuid::new_v4().simple());
        }
        donation.status = DonationStatus::Pending;
        donation.credited = false;
        donation.date = Utc::now().date_naive();

        // A reused transaction id fails the store's unique index.
        self.api.run(move |db| db.insert(donation)).await
    }

    /// Complete the donation and credit its project once.
    pub async fn confirm(&self, id: &str) -> ApiResult<Option<Confirmation>> {
        let id = id.to_string();
        self.api.run(move |db| db.confirm_donation(&id)).await
    }

    /// `Completed` goes through [`confirm`](Self::confirm) so the project
    /// total stays in step. Other statuses leave credited amounts in place.
    pub async fn update_status(&self, id: &str, status: DonationStatus) -> ApiResult<Option<Donation>> {
        if status == DonationStatus::Completed {
            return Ok(self.confirm(id).await?.map(|c| c.donation));
        }

        let id = id.to_string();
        let updated = self
            .api
            .run(move |db| db.modify::<Donation, _>(&id, |d| d.status = status))
            .await?;
        if let Some(d) = &updated {
            info!("Donation {} marked {:?}", d.id, d.status);
        }
        Ok(updated)
    }

    /// Totals by status and progress of every project.
    pub async fn summary(&self) -> ApiResult<DonationSummary> {
        let donations = self.list().await?;
        let projects = self.projects().list().await?;

        let count = |status: DonationStatus| donations.iter().filter(|d| d.status == status).count();
        let total_completed = donations
            .iter()
            .filter(|d| d.status == DonationStatus::Completed)
            .map(|d| d.amount)
            .sum();

        Ok(DonationSummary {
            total_completed,
            completed_count: count(DonationStatus::Completed),
            pending_count: count(DonationStatus::Pending),
            failed_count: count(DonationStatus::Failed),
            projects: projects
                .iter()
                .map(|p| ProjectProgress {
                    id: p.id.clone(),
                    title: p.title.clone(),
                    goal: p.goal,
                    raised: p.raised,
                    percent: p.percent(),
                })
                .collect(),
        })
    }

    pub fn projects(&self) -> Resource<'a, DonationProject> {
        self.api.collection()
    }
}
