//! Collection-specific operations layered on top of plain CRUD.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use chapel_types::api::QuizSubmission;
use chapel_types::models::{
    Announcement, BibleQuiz, ContactMessage, DailyVerse, Department, DepartmentInterest,
    InterestStatus, QuizResult, VerseReflection,
};

use crate::{ApiError, ApiResult, Resource};

fn fresh_id(id: &mut String) {
    if id.trim().is_empty() {
        *id = Uuid::new_v4().to_string();
    }
}

impl Resource<'_, Announcement> {
    /// Announcements currently switched on, most recent first.
    pub async fn list_active(&self) -> ApiResult<Vec<Announcement>> {
        let mut items = self.list().await?;
        items.retain(|a| a.is_active);
        Ok(items)
    }
}

// -- Department interests --

impl Resource<'_, DepartmentInterest> {
    /// Record an expression of interest. Always starts Pending, dated today,
    /// with the department's current name copied in.
    pub async fn submit(&self, mut interest: DepartmentInterest) -> ApiResult<DepartmentInterest> {
        fresh_id(&mut interest.id);
        interest.status = InterestStatus::Pending;
        interest.date = Utc::now().date_naive();

        self.api
            .run(move |db| {
                let Some(dept) = db.get::<Department>(&interest.department_id)? else {
                    return Ok(None);
                };
                interest.department_name = dept.name;
                db.insert(interest).map(Some)
            })
            .await?
            .ok_or_else(|| ApiError::NotFound("department".to_string()))
    }

    pub async fn update_status(&self, id: &str, status: InterestStatus) -> ApiResult<Option<DepartmentInterest>> {
        let id = id.to_string();
        self.api
            .run(move |db| db.modify::<DepartmentInterest, _>(&id, |i| i.status = status))
            .await
    }

    pub async fn list_for_department(&self, department_id: &str) -> ApiResult<Vec<DepartmentInterest>> {
        let mut items = self.list().await?;
        items.retain(|i| i.department_id == department_id);
        Ok(items)
    }
}

// -- Contact messages --

impl Resource<'_, ContactMessage> {
    /// Public contact form. New messages are unread.
    pub async fn submit(&self, mut message: ContactMessage) -> ApiResult<ContactMessage> {
        fresh_id(&mut message.id);
        message.is_read = false;
        message.date = Utc::now().date_naive();
        self.create(message).await
    }

    pub async fn mark_read(&self, id: &str, is_read: bool) -> ApiResult<Option<ContactMessage>> {
        let id = id.to_string();
        self.api
            .run(move |db| db.modify::<ContactMessage, _>(&id, |m| m.is_read = is_read))
            .await
    }

    /// Returns how many messages changed.
    pub async fn mark_all_read(&self) -> ApiResult<usize> {
        self.api.run(|db| db.mark_all_read()).await
    }
}

// -- Spiritual hub --

impl Resource<'_, DailyVerse> {
    /// The verse with the latest date. Ties go to the most recently added.
    pub async fn today(&self) -> ApiResult<Option<DailyVerse>> {
        let verses = self.list().await?;
        Ok(verses.into_iter().reduce(|best, v| if v.date > best.date { v } else { best }))
    }
}

impl Resource<'_, BibleQuiz> {
    /// Grade the answers and store the result. `None` if the quiz is unknown.
    pub async fn submit(&self, quiz_id: &str, submission: QuizSubmission) -> ApiResult<Option<QuizResult>> {
        let quiz_id = quiz_id.to_string();
        let result = self
            .api
            .run(move |db| db.record_quiz_result(&quiz_id, &submission))
            .await?;
        if let Some(r) = &result {
            info!("Quiz {} scored {}/{}", r.quiz_id, r.score, r.total);
        }
        Ok(result)
    }
}

impl Resource<'_, VerseReflection> {
    pub async fn submit(&self, mut reflection: VerseReflection) -> ApiResult<VerseReflection> {
        fresh_id(&mut reflection.id);
        reflection.date = Utc::now().date_naive();

        self.api
            .run(move |db| {
                if db.get::<DailyVerse>(&reflection.verse_id)?.is_none() {
                    return Ok(None);
                }
                db.insert(reflection).map(Some)
            })
            .await?
            .ok_or_else(|| ApiError::NotFound("verse".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use serde_json::json;

    fn interest(department_id: &str) -> DepartmentInterest {
        serde_json::from_value(json!({
            "fullName": "Efua Owusu",
            "email": "efua@uni.edu",
            "motivation": "I want to serve",
            "departmentId": department_id,
            "status": "Approved"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn interest_starts_pending_and_approval_touches_one_record() {
        let (api, _) = testing::api();
        let first = api.interests().submit(interest("3")).await.unwrap();
        let second = api.interests().submit(interest("3")).await.unwrap();

        assert_eq!(first.status, InterestStatus::Pending);
        assert_eq!(first.department_name, "Charismatic Renewal");
        assert_eq!(api.interests().list_for_department("3").await.unwrap().len(), 2);

        let approved = api
            .interests()
            .update_status(&first.id, InterestStatus::Approved)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(approved.status, InterestStatus::Approved);

        let untouched = api.interests().get(&second.id).await.unwrap().unwrap();
        assert_eq!(untouched, second);
    }

    #[tokio::test]
    async fn interest_for_unknown_department_is_rejected() {
        let (api, _) = testing::api();
        let err = api.interests().submit(interest("99")).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert!(api.interests().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn contact_read_flags() {
        let (api, _) = testing::api();
        let message: ContactMessage = serde_json::from_value(json!({
            "fullName": "Yaw",
            "email": "yaw@uni.edu",
            "subject": "Mass times",
            "message": "When is the evening Mass?",
            "isRead": true
        }))
        .unwrap();

        let stored = api.contacts().submit(message).await.unwrap();
        assert!(!stored.is_read);

        let read = api.contacts().mark_read(&stored.id, true).await.unwrap().unwrap();
        assert!(read.is_read);
        assert!(api.contacts().mark_read("missing", true).await.unwrap().is_none());

        api.contacts().mark_read(&stored.id, false).await.unwrap();
        assert!(api.contacts().mark_all_read().await.unwrap() >= 1);
        assert!(api.contacts().list().await.unwrap().iter().all(|m| m.is_read));
        assert_eq!(api.contacts().mark_all_read().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn quiz_submission_is_graded() {
        let (api, _) = testing::api();
        let submission = QuizSubmission {
            full_name: "Kofi".into(),
            email: String::new(),
            answers: vec!["Mark".into(), "Nazareth".into(), "John the Baptist".into()],
        };

        let result = api.quizzes().submit("1", submission.clone()).await.unwrap().unwrap();
        assert_eq!((result.score, result.total), (2, 3));
        assert_eq!(api.quiz_results().list().await.unwrap()[0], result);

        assert!(api.quizzes().submit("404", submission).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn latest_verse_is_today() {
        let (api, _) = testing::api();
        let verse: DailyVerse = serde_json::from_value(json!({
            "reference": "Psalm 23:1",
            "text": "The Lord is my shepherd",
            "date": "2999-01-01"
        }))
        .unwrap();
        let created = api.verses().create(verse).await.unwrap();
        assert_eq!(api.verses().today().await.unwrap().unwrap().id, created.id);
    }

    #[tokio::test]
    async fn reflection_needs_a_verse() {
        let (api, _) = testing::api();
        let reflection = |verse: &str| -> VerseReflection {
            serde_json::from_value(json!({
                "verseId": verse,
                "fullName": "Akos",
                "content": "Comforting words"
            }))
            .unwrap()
        };

        assert!(api.reflections().submit(reflection("1")).await.is_ok());
        assert!(matches!(
            api.reflections().submit(reflection("nope")).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn inactive_announcements_are_hidden() {
        let (api, _) = testing::api();
        let all = api.announcements().list().await.unwrap();
        let target = &all[0];
        let patch = json!({ "isActive": false }).as_object().cloned().unwrap();
        api.announcements().update(&target.id, patch).await.unwrap();

        let active = api.announcements().list_active().await.unwrap();
        assert!(active.iter().all(|a| a.id != target.id));
        assert_eq!(active.len(), all.iter().filter(|a| a.is_active).count() - 1);
    }
}
