use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use chapel_types::Validate;
use chapel_types::models::{
    AboutConfig, Announcement, BibleQuiz, ContactMessage, DailyVerse, Department,
    DepartmentInterest, Donation, DonationProject, HomeConfig, Leader, Member, NewsItem,
    QuizResult, VerseReflection,
};

/// Named collections. The string form is the stored collection key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Members,
    News,
    Leaders,
    Announcements,
    Departments,
    DepartmentInterests,
    Contacts,
    Donations,
    DonationProjects,
    DailyVerses,
    Quizzes,
    Reflections,
    QuizResults,
}

impl Collection {
    pub const ALL: [Collection; 13] = [
        Collection::Members,
        Collection::News,
        Collection::Leaders,
        Collection::Announcements,
        Collection::Departments,
        Collection::DepartmentInterests,
        Collection::Contacts,
        Collection::Donations,
        Collection::DonationProjects,
        Collection::DailyVerses,
        Collection::Quizzes,
        Collection::Reflections,
        Collection::QuizResults,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Members => "members",
            Collection::News => "news",
            Collection::Leaders => "leaders",
            Collection::Announcements => "announcements",
            Collection::Departments => "departments",
            Collection::DepartmentInterests => "departmentInterests",
            Collection::Contacts => "contacts",
            Collection::Donations => "donations",
            Collection::DonationProjects => "donationProjects",
            Collection::DailyVerses => "dailyVerses",
            Collection::Quizzes => "quizzes",
            Collection::Reflections => "reflections",
            Collection::QuizResults => "quizResults",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record type stored in one id-keyed collection.
pub trait Document: Serialize + DeserializeOwned + Validate + Clone + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
}

macro_rules! document {
    ($($ty:ty => $collection:ident),+ $(,)?) => {
        $(
            impl Document for $ty {
                const COLLECTION: Collection = Collection::$collection;

                fn id(&self) -> &str {
                    &self.id
                }

                fn set_id(&mut self, id: String) {
                    self.id = id;
                }
            }
        )+
    };
}

document! {
    Member => Members,
    NewsItem => News,
    Leader => Leaders,
    Announcement => Announcements,
    Department => Departments,
    DepartmentInterest => DepartmentInterests,
    ContactMessage => Contacts,
    Donation => Donations,
    DonationProject => DonationProjects,
    DailyVerse => DailyVerses,
    BibleQuiz => Quizzes,
    VerseReflection => Reflections,
    QuizResult => QuizResults,
}

/// An id-less singleton record, merged in place and never deleted.
pub trait Setting: Serialize + DeserializeOwned + Validate + Default + Clone + Send + Sync + 'static {
    const KEY: &'static str;
}

impl Setting for HomeConfig {
    const KEY: &'static str = "homeConfig";
}

impl Setting for AboutConfig {
    const KEY: &'static str = "aboutConfig";
}

pub const SETTING_KEYS: [&str; 2] = [HomeConfig::KEY, AboutConfig::KEY];

/// Shallow merge: each top-level field in `patch` replaces the record's field.
/// Fields named in `protected` are left untouched.
pub fn merge_fields<T>(current: &T, patch: &Map<String, Value>, protected: &[&str]) -> Result<T, serde_json::Error>
where
    T: Serialize + DeserializeOwned,
{
    let mut value = serde_json::to_value(current)?;
    if let Value::Object(fields) = &mut value {
        for (key, field) in patch {
            if protected.contains(&key.as_str()) {
                continue;
            }
            fields.insert(key.clone(), field.clone());
        }
    }
    serde_json::from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leader() -> Leader {
        serde_json::from_value(json!({
            "id": "7",
            "name": "Kofi",
            "position": "President",
            "type": "Executive"
        }))
        .unwrap()
    }

    #[test]
    fn merge_replaces_named_fields_only() {
        let patch = json!({ "position": "Secretary", "id": "other" });
        let merged = merge_fields(&leader(), patch.as_object().unwrap(), &["id"]).unwrap();
        assert_eq!(merged.id, "7");
        assert_eq!(merged.position, "Secretary");
        assert_eq!(merged.name, "Kofi");
    }

    #[test]
    fn merge_rejects_wrong_types() {
        let patch = json!({ "type": "Chaplain" });
        assert!(merge_fields(&leader(), patch.as_object().unwrap(), &["id"]).is_err());
    }

    #[test]
    fn collection_keys_are_unique() {
        let mut names: Vec<_> = Collection::ALL.iter().map(|c| c.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Collection::ALL.len());
    }
}
