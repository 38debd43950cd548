use tracing::{info, warn};
use uuid::Uuid;

use chapel_types::Validate;
use chapel_types::api::QuizSubmission;
use chapel_types::models::{
    BibleQuiz, ContactMessage, Donation, DonationProject, DonationStatus, QuizResult,
};

use crate::queries::{insert_doc, load_all, load_one, log_activity, write_doc};
use crate::{Database, StoreResult};

/// Outcome of confirming a donation.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub donation: Donation,
    /// The project whose total now includes this donation, if any.
    pub project: Option<DonationProject>,
    /// False when the donation had already been credited earlier.
    pub newly_credited: bool,
}

impl Database {
    /// Mark a donation Completed and credit its amount to the project it
    /// names, as one transaction. Confirming again never credits twice.
    /// Returns `None` if the donation does not exist.
    pub fn confirm_donation(&self, id: &str) -> StoreResult<Option<Confirmation>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(mut donation) = load_one::<Donation>(&tx, id)? else {
                return Ok(None);
            };

            donation.status = DonationStatus::Completed;
            let mut project = None;
            let mut newly_credited = false;

            if let Some(title) = donation.project.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                let target = load_all::<DonationProject>(&tx)?
                    .into_iter()
                    .find(|p| p.title.trim() == title);

                match target {
                    Some(mut p) if !donation.credited => {
                        p.raised += donation.amount;
                        p.validate()?;
                        write_doc(&tx, &p)?;
                        donation.credited = true;
                        newly_credited = true;
                        project = Some(p);
                    }
                    Some(p) => project = Some(p),
                    None => warn!("Donation {} names unknown project '{}'", id, title),
                }
            }

            write_doc(&tx, &donation)?;
            log_activity(&tx, &format!("Confirmed donation {}", id))?;
            tx.commit()?;

            if newly_credited {
                info!("Donation {} credited {} {} to project", id, donation.amount, donation.currency);
            }
            Ok(Some(Confirmation {
                donation,
                project,
                newly_credited,
            }))
        })
    }

    /// Grade a submission against the quiz and store the result.
    /// Returns `None` if the quiz does not exist.
    pub fn record_quiz_result(&self, quiz_id: &str, submission: &QuizSubmission) -> StoreResult<Option<QuizResult>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(quiz) = load_one::<BibleQuiz>(&tx, quiz_id)? else {
                return Ok(None);
            };

            let result = QuizResult {
                id: Uuid::new_v4().to_string(),
                quiz_id: quiz.id.clone(),
                quiz_title: quiz.title.clone(),
                full_name: submission.full_name.clone(),
                email: submission.email.clone(),
                score: quiz.grade(&submission.answers),
                total: quiz.questions.len() as u32,
                date: chrono::Utc::now().date_naive(),
            };
            result.validate()?;

            insert_doc(&tx, &result)?;
            log_activity(&tx, &format!("Recorded quiz result for {}", quiz.title))?;
            tx.commit()?;
            Ok(Some(result))
        })
    }

    /// Flag every contact message as read. Returns how many changed.
    pub fn mark_all_read(&self) -> StoreResult<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut changed = 0;
            for mut message in load_all::<ContactMessage>(&tx)? {
                if message.is_read {
                    continue;
                }
                message.is_read = true;
                write_doc(&tx, &message)?;
                changed += 1;
            }
            log_activity(&tx, "Marked all messages as read")?;
            tx.commit()?;
            Ok(changed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chapel_types::models::DonationCategory;

    fn pending(id: &str, amount: f64, project: Option<&str>) -> Donation {
        Donation {
            id: id.into(),
            donor_name: "Yaw".into(),
            email: "yaw@uni.edu".into(),
            phone: String::new(),
            amount,
            currency: "GHS".into(),
            category: DonationCategory::ProjectBased,
            project: project.map(Into::into),
            date: chrono::Utc::now().date_naive(),
            status: DonationStatus::Pending,
            transaction_id: format!("TXN-{}", id),
            credited: false,
        }
    }

    fn raised(db: &Database, project_id: &str) -> f64 {
        db.get::<DonationProject>(project_id).unwrap().unwrap().raised
    }

    #[test]
    fn confirmation_credits_project_once() {
        let db = Database::open_in_memory().unwrap();
        let before = raised(&db, "2");
        db.insert(pending("d1", 250.0, Some("Charity Outreach"))).unwrap();

        let first = db.confirm_donation("d1").unwrap().unwrap();
        assert!(first.newly_credited);
        assert_eq!(first.donation.status, DonationStatus::Completed);
        assert_eq!(raised(&db, "2"), before + 250.0);

        let second = db.confirm_donation("d1").unwrap().unwrap();
        assert!(!second.newly_credited);
        assert_eq!(raised(&db, "2"), before + 250.0);

        let stored = db.get::<Donation>("d1").unwrap().unwrap();
        assert!(stored.credited);
        assert_eq!(stored.status, DonationStatus::Completed);
    }

    #[test]
    fn confirmation_without_project_only_completes() {
        let db = Database::open_in_memory().unwrap();
        let projects = db.list::<DonationProject>().unwrap();
        db.insert(pending("d2", 40.0, None)).unwrap();
        db.insert(pending("d3", 40.0, Some("No Such Project"))).unwrap();

        let c = db.confirm_donation("d2").unwrap().unwrap();
        assert!(c.project.is_none());
        let c = db.confirm_donation("d3").unwrap().unwrap();
        assert!(!c.newly_credited);
        assert!(!c.donation.credited);

        assert_eq!(db.list::<DonationProject>().unwrap(), projects);
    }

    #[test]
    fn confirming_missing_donation() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.confirm_donation("absent").unwrap().is_none());
    }

    #[test]
    fn quiz_result_scores_answers() {
        let db = Database::open_in_memory().unwrap();
        let submission = QuizSubmission {
            full_name: "Akua".into(),
            email: "akua@uni.edu".into(),
            answers: vec!["Mark".into(), "Nazareth".into(), "John the Baptist".into()],
        };

        let result = db.record_quiz_result("1", &submission).unwrap().unwrap();
        assert_eq!(result.score, 2);
        assert_eq!(result.total, 3);
        assert_eq!(db.list::<QuizResult>().unwrap()[0], result);

        assert!(db.record_quiz_result("missing", &submission).unwrap().is_none());
    }

    #[test]
    fn mark_all_read_touches_only_unread() {
        let db = Database::open_in_memory().unwrap();
        let unread = db.list::<ContactMessage>().unwrap().iter().filter(|m| !m.is_read).count();

        assert_eq!(db.mark_all_read().unwrap(), unread);
        assert!(db.list::<ContactMessage>().unwrap().iter().all(|m| m.is_read));
        assert_eq!(db.mark_all_read().unwrap(), 0);
    }
}
