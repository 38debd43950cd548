use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Records map directly to stored JSON documents. Field names stay camelCase
/// so persisted documents and REST bodies share one shape.

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// -- Members --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Admin,
    Executive,
    Accountant,
    Secretary,
    It,
    Guest,
}

impl Role {
    /// Staff roles may edit site content.
    pub fn is_staff(self) -> bool {
        !matches!(self, Role::Member | Role::Guest)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    #[serde(default)]
    pub id: String,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default)]
    pub program: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub diocese: String,
    #[serde(default)]
    pub department: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_role() -> Role {
    Role::Member
}

// -- News --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsCategory {
    Event,
    News,
    Announcement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: NewsCategory,
    #[serde(default)]
    pub media_url: String,
    #[serde(default = "default_media_type")]
    pub media_type: MediaType,
    #[serde(default)]
    pub author: String,
    #[serde(default = "today")]
    pub date: NaiveDate,
}

fn default_media_type() -> MediaType {
    MediaType::Image
}

// -- Leaders --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaderType {
    Executive,
    Arbitration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leader {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub position: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub academic_year: String,
    #[serde(default)]
    pub image: String,
    #[serde(rename = "type")]
    pub kind: LeaderType,
}

// -- Announcements --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnouncementStatus {
    Notice,
    Urgent,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default = "today")]
    pub date: NaiveDate,
    pub status: AnnouncementStatus,
    /// CSS class token chosen by the editor.
    #[serde(default)]
    pub color: String,
    #[serde(default = "yes")]
    pub is_active: bool,
}

fn yes() -> bool {
    true
}

// -- Departments --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub description: String,
    /// Either an icon name or inline image data.
    #[serde(default)]
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub details: String,
    #[serde(default, deserialize_with = "list_or_comma_string")]
    pub activities: Vec<String>,
}

/// Split comma-separated form input into trimmed, non-empty activities.
pub fn split_activities(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Older documents stored activities as one comma-joined string.
fn list_or_comma_string<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Activities {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Activities::deserialize(deserializer)? {
        Activities::List(list) => list,
        Activities::Joined(joined) => split_activities(&joined),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterestStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentInterest {
    #[serde(default)]
    pub id: String,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub diocese: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub program: String,
    pub motivation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    /// Taken from the route when submitted over REST.
    #[serde(default)]
    pub department_id: String,
    #[serde(default)]
    pub department_name: String,
    #[serde(default = "pending_interest")]
    pub status: InterestStatus,
    #[serde(default = "today")]
    pub date: NaiveDate,
}

fn pending_interest() -> InterestStatus {
    InterestStatus::Pending
}

// -- Donations --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DonationCategory {
    #[serde(rename = "One-time")]
    OneTime,
    Monthly,
    #[serde(rename = "Project-based")]
    ProjectBased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DonationStatus {
    Completed,
    Pending,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    #[serde(default)]
    pub id: String,
    pub donor_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub category: DonationCategory,
    /// Title of the project this donation supports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default = "today")]
    pub date: NaiveDate,
    #[serde(default = "pending_donation")]
    pub status: DonationStatus,
    #[serde(default)]
    pub transaction_id: String,
    /// Set once the amount has been added to the project's total.
    #[serde(default)]
    pub credited: bool,
}

fn default_currency() -> String {
    "GHS".to_string()
}

fn pending_donation() -> DonationStatus {
    DonationStatus::Pending
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationProject {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub goal: f64,
    #[serde(default)]
    pub raised: f64,
    #[serde(default)]
    pub image: String,
    #[serde(default = "yes")]
    pub is_active: bool,
}

impl DonationProject {
    /// Progress toward the goal, capped at 100.
    pub fn percent(&self) -> f64 {
        if self.goal <= 0.0 {
            return 0.0;
        }
        (self.raised / self.goal * 100.0).clamp(0.0, 100.0)
    }
}

// -- Contacts --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    #[serde(default)]
    pub id: String,
    pub full_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    #[serde(default = "today")]
    pub date: NaiveDate,
    #[serde(default)]
    pub is_read: bool,
}

// -- Site settings --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HomeConfig {
    pub hero_title: String,
    pub hero_subtitle: String,
    pub hero_image: String,
    pub welcome_title: String,
    pub welcome_message: String,
    pub featured_verse: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub address: String,
}

impl Default for HomeConfig {
    fn default() -> Self {
        Self {
            hero_title: "Welcome to the Catholic Students' Association".to_string(),
            hero_subtitle: "Faith, fellowship and service on campus".to_string(),
            hero_image: String::new(),
            welcome_title: "A home away from home".to_string(),
            welcome_message: "Join us for Mass, prayer meetings and outreach throughout the semester.".to_string(),
            featured_verse: "Let all that you do be done in love. (1 Corinthians 16:14)".to_string(),
            contact_email: "info@chapel.local".to_string(),
            contact_phone: String::new(),
            address: "University Chapel, Main Campus".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AboutConfig {
    pub title: String,
    pub history: String,
    pub mission: String,
    pub vision: String,
    pub values: Vec<String>,
    pub image: String,
}

impl Default for AboutConfig {
    fn default() -> Self {
        Self {
            title: "About Us".to_string(),
            history: "Founded by students who gathered for weekly Mass in a lecture hall.".to_string(),
            mission: "To form students in faith, scholarship and service.".to_string(),
            vision: "A campus community rooted in Christ.".to_string(),
            values: vec!["Faith".to_string(), "Service".to_string(), "Fellowship".to_string()],
            image: String::new(),
        }
    }
}

// -- Spiritual hub --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyVerse {
    #[serde(default)]
    pub id: String,
    pub reference: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<String>,
    #[serde(default = "today")]
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    #[serde(default)]
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BibleQuiz {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub questions: Vec<QuizQuestion>,
    #[serde(default = "yes")]
    pub is_active: bool,
    #[serde(default = "today")]
    pub date: NaiveDate,
}

impl BibleQuiz {
    /// Count answers equal to the question's correct answer, position by position.
    /// Missing answers count as wrong, extra answers are ignored.
    pub fn grade(&self, answers: &[String]) -> u32 {
        self.questions
            .iter()
            .zip(answers)
            .filter(|(q, a)| q.correct_answer == **a)
            .count() as u32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerseReflection {
    #[serde(default)]
    pub id: String,
    pub verse_id: String,
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    pub content: String,
    #[serde(default = "today")]
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    #[serde(default)]
    pub id: String,
    pub quiz_id: String,
    #[serde(default)]
    pub quiz_title: String,
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    pub score: u32,
    pub total: u32,
    #[serde(default = "today")]
    pub date: NaiveDate,
}
