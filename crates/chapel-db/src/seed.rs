use chrono::{Duration, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use chapel_types::models::{
    AboutConfig, Announcement, AnnouncementStatus, BibleQuiz, ContactMessage, DailyVerse,
    Department, DepartmentInterest, Donation, DonationCategory, DonationProject, DonationStatus,
    HomeConfig, Leader, LeaderType, MediaType, Member, NewsCategory, NewsItem, QuizQuestion,
    QuizResult, Role, VerseReflection,
};
use chapel_types::validate::normalize_email;

use crate::documents::{Document, Setting};
use crate::queries::{insert_doc, write_settings};
use crate::StoreResult;

pub const DEFAULT_ROOT_EMAIL: &str = "admin@chapel.local";

/// Seed every collection and setting that has never been seeded. A fresh
/// database gets all defaults; an older one gets only the collections added
/// since it was created. Existing records are never touched, but an admin
/// account for `root_email` is added if none exists.
/// Returns the names that were seeded.
pub fn run(conn: &Connection, root_email: &str) -> StoreResult<Vec<&'static str>> {
    let mut seeded = Vec::new();

    seed_collection(conn, vec![root_member("1", root_email)], &mut seeded)?;
    seed_collection(conn, news(), &mut seeded)?;
    seed_collection(conn, leaders(), &mut seeded)?;
    seed_collection(conn, announcements(), &mut seeded)?;
    seed_collection(conn, departments(), &mut seeded)?;
    seed_collection::<DepartmentInterest>(conn, vec![], &mut seeded)?;
    seed_collection(conn, contacts(), &mut seeded)?;
    seed_collection(conn, donations(), &mut seeded)?;
    seed_collection(conn, donation_projects(), &mut seeded)?;
    seed_collection(conn, verses(), &mut seeded)?;
    seed_collection(conn, quizzes(), &mut seeded)?;
    seed_collection::<VerseReflection>(conn, vec![], &mut seeded)?;
    seed_collection::<QuizResult>(conn, vec![], &mut seeded)?;

    seed_setting::<HomeConfig>(conn, &mut seeded)?;
    seed_setting::<AboutConfig>(conn, &mut seeded)?;

    if ensure_root(conn, root_email)? {
        seeded.push("root account");
    }

    Ok(seeded)
}

/// Add an admin member for `root_email` unless one already has that email.
/// Returns whether a member was added.
pub fn ensure_root(conn: &Connection, root_email: &str) -> StoreResult<bool> {
    let email = normalize_email(root_email);
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM documents
         WHERE collection = ?1 AND lower(trim(json_extract(body, '$.email'))) = ?2)",
        (Member::COLLECTION.as_str(), &email),
        |row| row.get(0),
    )?;
    if exists {
        return Ok(false);
    }

    insert_doc(conn, &root_member(&Uuid::new_v4().to_string(), &email))?;
    Ok(true)
}

fn already_seeded(conn: &Connection, name: &str) -> StoreResult<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM seeded_collections WHERE name = ?1)",
        [name],
        |row| row.get(0),
    )?)
}

fn mark_seeded(conn: &Connection, name: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO seeded_collections (name, seeded_at) VALUES (?1, ?2)",
        (name, Utc::now().to_rfc3339()),
    )?;
    Ok(())
}

fn seed_collection<T: Document>(conn: &Connection, defaults: Vec<T>, seeded: &mut Vec<&'static str>) -> StoreResult<()> {
    let name = T::COLLECTION.as_str();
    if already_seeded(conn, name)? {
        return Ok(());
    }

    let existing: i64 = conn.query_row(
        "SELECT COUNT(*) FROM documents WHERE collection = ?1",
        [name],
        |row| row.get(0),
    )?;

    // Inserted in reverse so the list reads in declaration order.
    if existing == 0 {
        for item in defaults.into_iter().rev() {
            insert_doc(conn, &item)?;
        }
    }

    mark_seeded(conn, name)?;
    seeded.push(name);
    Ok(())
}

fn seed_setting<S: Setting>(conn: &Connection, seeded: &mut Vec<&'static str>) -> StoreResult<()> {
    if already_seeded(conn, S::KEY)? {
        return Ok(());
    }

    let present: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM settings WHERE key = ?1)",
        [S::KEY],
        |row| row.get(0),
    )?;
    if !present {
        write_settings(conn, &S::default())?;
    }

    mark_seeded(conn, S::KEY)?;
    seeded.push(S::KEY);
    Ok(())
}

fn root_member(id: &str, email: &str) -> Member {
    Member {
        id: id.into(),
        full_name: "Association Administrator".into(),
        email: normalize_email(email),
        phone: String::new(),
        role: Role::Admin,
        program: String::new(),
        level: String::new(),
        diocese: String::new(),
        department: String::new(),
        profile_image: None,
        created_at: Utc::now(),
    }
}

fn news() -> Vec<NewsItem> {
    let today = Utc::now().date_naive();
    vec![
        NewsItem {
            id: "1".into(),
            title: "Freshers' Welcome Mass".into(),
            content: "All new students are invited to the welcome Mass and reception at the chapel.".into(),
            category: NewsCategory::Event,
            media_url: String::new(),
            media_type: MediaType::Image,
            author: "Secretariat".into(),
            date: today,
        },
        NewsItem {
            id: "2".into(),
            title: "Semester Retreat Registration Open".into(),
            content: "Registration for the semester retreat closes at the end of the month.".into(),
            category: NewsCategory::News,
            media_url: String::new(),
            media_type: MediaType::Image,
            author: "Secretariat".into(),
            date: today - Duration::days(3),
        },
    ]
}

fn leaders() -> Vec<Leader> {
    vec![
        Leader {
            id: "1".into(),
            name: "Association President".into(),
            position: "President".into(),
            phone: String::new(),
            academic_year: "2025/2026".into(),
            image: String::new(),
            kind: LeaderType::Executive,
        },
        Leader {
            id: "2".into(),
            name: "Arbitration Chair".into(),
            position: "Chairperson".into(),
            phone: String::new(),
            academic_year: "2025/2026".into(),
            image: String::new(),
            kind: LeaderType::Arbitration,
        },
    ]
}

fn announcements() -> Vec<Announcement> {
    let today = Utc::now().date_naive();
    vec![
        Announcement {
            id: "1".into(),
            title: "Sunday Mass Time".into(),
            content: "Sunday Mass begins at 7:00am in the main chapel.".into(),
            date: today,
            status: AnnouncementStatus::Info,
            color: "bg-blue-500".into(),
            is_active: true,
        },
        Announcement {
            id: "2".into(),
            title: "Dues Deadline".into(),
            content: "Membership dues should be settled before mid-semester.".into(),
            date: today,
            status: AnnouncementStatus::Urgent,
            color: "bg-red-500".into(),
            is_active: true,
        },
    ]
}

fn department(id: &str, name: &str, icon: &str, category: &str, activities: &[&str]) -> Department {
    Department {
        id: id.into(),
        name: name.into(),
        description: format!("The {} serves the association and the chapel community.", name),
        icon: icon.into(),
        image: None,
        category: category.into(),
        details: String::new(),
        activities: activities.iter().map(|a| a.to_string()).collect(),
    }
}

fn departments() -> Vec<Department> {
    vec![
        department("1", "Choir", "Music", "Liturgical", &["Sunday Mass", "Rehearsals", "Carol night"]),
        department("2", "Lectors", "BookOpen", "Liturgical", &["Readings", "Training"]),
        department("3", "Charismatic Renewal", "Flame", "Spiritual", &["Prayer meetings", "Retreats"]),
        department("4", "Welfare", "HeartHandshake", "Service", &["Hospital visits", "Outreach"]),
    ]
}

fn contacts() -> Vec<ContactMessage> {
    vec![ContactMessage {
        id: "1".into(),
        full_name: "Portal".into(),
        email: "portal@chapel.local".into(),
        phone: None,
        subject: "Welcome".into(),
        message: "Messages sent from the contact form appear here.".into(),
        date: Utc::now().date_naive(),
        is_read: false,
    }]
}

fn donation_projects() -> Vec<DonationProject> {
    vec![
        DonationProject {
            id: "1".into(),
            title: "Chapel Renovation".into(),
            description: "Roofing and pews for the main chapel.".into(),
            goal: 50_000.0,
            raised: 12_500.0,
            image: String::new(),
            is_active: true,
        },
        DonationProject {
            id: "2".into(),
            title: "Charity Outreach".into(),
            description: "Food and supplies for the semester outreach.".into(),
            goal: 10_000.0,
            raised: 0.0,
            image: String::new(),
            is_active: true,
        },
    ]
}

fn donations() -> Vec<Donation> {
    vec![Donation {
        id: "1".into(),
        donor_name: "Anonymous".into(),
        email: "donor@chapel.local".into(),
        phone: String::new(),
        amount: 500.0,
        currency: "GHS".into(),
        category: DonationCategory::ProjectBased,
        project: Some("Chapel Renovation".into()),
        date: Utc::now().date_naive(),
        status: DonationStatus::Completed,
        transaction_id: "TXN-SEED-0001".into(),
        credited: true,
    }]
}

fn verses() -> Vec<DailyVerse> {
    vec![DailyVerse {
        id: "1".into(),
        reference: "Psalm 119:105".into(),
        text: "Your word is a lamp to my feet and a light to my path.".into(),
        reflection: None,
        date: Utc::now().date_naive(),
    }]
}

fn question(id: &str, text: &str, options: &[&str], answer: &str) -> QuizQuestion {
    QuizQuestion {
        id: id.into(),
        question: text.into(),
        options: options.iter().map(|o| o.to_string()).collect(),
        correct_answer: answer.into(),
    }
}

fn quizzes() -> Vec<BibleQuiz> {
    vec![BibleQuiz {
        id: "1".into(),
        title: "The Gospels".into(),
        description: "A short warm-up on the four Gospels.".into(),
        questions: vec![
            question("1", "Which Gospel is the shortest?", &["Matthew", "Mark", "Luke", "John"], "Mark"),
            question("2", "Where was Jesus born?", &["Nazareth", "Jerusalem", "Bethlehem"], "Bethlehem"),
            question("3", "Who baptised Jesus?", &["Peter", "John the Baptist", "Paul"], "John the Baptist"),
        ],
        is_active: true,
        date: Utc::now().date_naive(),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::documents::Collection;

    #[test]
    fn fresh_store_has_every_collection_seeded() {
        let db = Database::open_in_memory().unwrap();
        let marked: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM seeded_collections", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(marked as usize, Collection::ALL.len() + 2);

        let depts = db.list::<Department>().unwrap();
        assert_eq!(depts.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(), ["1", "2", "3", "4"]);
        assert!(db.list::<DepartmentInterest>().unwrap().is_empty());
    }

    #[test]
    fn seeding_twice_adds_nothing() {
        let db = Database::open_in_memory().unwrap();
        let again = db
            .with_conn_mut(|conn| {
                let tx = conn.transaction()?;
                let seeded = run(&tx, DEFAULT_ROOT_EMAIL)?;
                tx.commit()?;
                Ok(seeded)
            })
            .unwrap();
        assert!(again.is_empty());
        assert_eq!(db.list::<Department>().unwrap().len(), 4);
    }

    #[test]
    fn configured_root_email_is_seeded() {
        let db = Database::open_in_memory_with_root("Rector@Uni.edu").unwrap();
        assert_eq!(db.root_email(), "rector@uni.edu");

        let root = db.find_member_by_email("rector@uni.edu").unwrap().unwrap();
        assert_eq!(root.id, "1");
        assert_eq!(root.role, Role::Admin);
        assert!(db.find_member_by_email(DEFAULT_ROOT_EMAIL).unwrap().is_none());
    }

    #[test]
    fn changed_root_email_gets_an_admin_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chapel.db");
        drop(Database::open(&path).unwrap());

        let db = Database::open_with_root(&path, "rector@uni.edu").unwrap();
        let root = db.find_member_by_email("rector@uni.edu").unwrap().unwrap();
        assert_eq!(root.role, Role::Admin);
        assert_ne!(root.id, "1");
        assert_eq!(db.list::<Member>().unwrap().len(), 2);

        drop(db);
        let db = Database::open_with_root(&path, "rector@uni.edu").unwrap();
        assert_eq!(db.list::<Member>().unwrap().len(), 2);
    }
}
