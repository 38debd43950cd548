use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde_json::{Map, Value};
use tracing::debug;

use chapel_types::Validate;
use chapel_types::api::ActivityEntry;
use chapel_types::models::Member;
use chapel_types::validate::normalize_email;

use crate::documents::{Document, Setting, merge_fields};
use crate::{Database, StoreError, StoreResult};

/// Oldest activity entries are dropped beyond this many.
pub const MAX_LOG_ENTRIES: i64 = 50;

const CURRENT_USER_KEY: &str = "currentUser";

impl Database {
    // -- Collections --

    /// Owned copy of a collection, most recent first.
    pub fn list<T: Document>(&self) -> StoreResult<Vec<T>> {
        self.with_conn(|conn| load_all::<T>(conn))
    }

    pub fn get<T: Document>(&self, id: &str) -> StoreResult<Option<T>> {
        self.with_conn(|conn| load_one::<T>(conn, id))
    }

    /// Validate and store `item` at the front of its collection.
    pub fn insert<T: Document>(&self, item: T) -> StoreResult<T> {
        item.validate()?;
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            insert_doc(&tx, &item)?;
            log_activity(&tx, &format!("Added new record to {}", T::COLLECTION))?;
            tx.commit()?;
            debug!("Inserted {} into {}", item.id(), T::COLLECTION);
            Ok(item)
        })
    }

    /// Shallow-merge `patch` into the record with `id`. Returns `None`, and
    /// changes nothing, when no such record exists.
    pub fn update<T: Document>(&self, id: &str, patch: &Map<String, Value>) -> StoreResult<Option<T>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(current) = load_one::<T>(&tx, id)? else {
                debug!("Update skipped: {} has no record {}", T::COLLECTION, id);
                return Ok(None);
            };
            let merged: T = merge_fields(&current, patch, &["id"])
                .map_err(|e| StoreError::malformed(T::COLLECTION.as_str(), e))?;
            merged.validate()?;
            write_doc(&tx, &merged)?;
            log_activity(&tx, &format!("Updated record {} in {}", id, T::COLLECTION))?;
            tx.commit()?;
            Ok(Some(merged))
        })
    }

    /// Typed in-place change of one record, same missing-id contract as `update`.
    pub fn modify<T, F>(&self, id: &str, change: F) -> StoreResult<Option<T>>
    where
        T: Document,
        F: FnOnce(&mut T),
    {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let Some(mut record) = load_one::<T>(&tx, id)? else {
                return Ok(None);
            };
            change(&mut record);
            record.set_id(id.to_string());
            record.validate()?;
            write_doc(&tx, &record)?;
            log_activity(&tx, &format!("Updated record {} in {}", id, T::COLLECTION))?;
            tx.commit()?;
            Ok(Some(record))
        })
    }

    /// Returns whether a record was removed.
    pub fn delete<T: Document>(&self, id: &str) -> StoreResult<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                (T::COLLECTION.as_str(), id),
            )? > 0;
            if removed {
                log_activity(&tx, &format!("Deleted record {} from {}", id, T::COLLECTION))?;
            }
            tx.commit()?;
            Ok(removed)
        })
    }

    // -- Settings --

    /// The stored singleton, or its defaults if it was never written.
    pub fn get_settings<S: Setting>(&self) -> StoreResult<S> {
        self.with_conn(|conn| load_settings::<S>(conn))
    }

    pub fn merge_settings<S: Setting>(&self, patch: &Map<String, Value>) -> StoreResult<S> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let current = load_settings::<S>(&tx)?;
            let merged: S = merge_fields(&current, patch, &[])
                .map_err(|e| StoreError::malformed(S::KEY, e))?;
            merged.validate()?;
            write_settings(&tx, &merged)?;
            log_activity(&tx, &format!("Updated {}", S::KEY))?;
            tx.commit()?;
            Ok(merged)
        })
    }

    // -- Members --

    /// Case-insensitive email lookup.
    pub fn find_member_by_email(&self, email: &str) -> StoreResult<Option<Member>> {
        let email = normalize_email(email);
        self.with_conn(|conn| {
            let body: Option<String> = conn
                .query_row(
                    "SELECT body FROM documents
                     WHERE collection = ?1 AND lower(trim(json_extract(body, '$.email'))) = ?2
                     ORDER BY seq DESC LIMIT 1",
                    (Member::COLLECTION.as_str(), &email),
                    |row| row.get(0),
                )
                .optional()?;
            body.map(|b| decode::<Member>(&b)).transpose()
        })
    }

    /// Store a new member and, when given, its password hash in one
    /// transaction. A second account for the same email fails with `Taken`.
    pub fn insert_member(&self, mut member: Member, password_hash: Option<&str>) -> StoreResult<Member> {
        member.email = normalize_email(&member.email);
        member.validate()?;
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            insert_doc(&tx, &member)?;
            if let Some(hash) = password_hash {
                tx.execute(
                    "INSERT INTO credentials (member_id, password_hash) VALUES (?1, ?2)",
                    (&member.id, hash),
                )?;
            }
            log_activity(&tx, &format!("Added new record to {}", Member::COLLECTION))?;
            tx.commit()?;
            debug!("Inserted member {}", member.id);
            Ok(member)
        })
    }

    pub fn set_password_hash(&self, member_id: &str, hash: &str) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO credentials (member_id, password_hash) VALUES (?1, ?2)
                 ON CONFLICT(member_id) DO UPDATE SET password_hash = excluded.password_hash",
                (member_id, hash),
            )?;
            Ok(())
        })
    }

    pub fn password_hash(&self, member_id: &str) -> StoreResult<Option<String>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT password_hash FROM credentials WHERE member_id = ?1",
                    [member_id],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    pub fn remove_credentials(&self, member_id: &str) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            conn.execute("DELETE FROM credentials WHERE member_id = ?1", [member_id])?;
            Ok(())
        })
    }

    // -- Session --

    /// Profile of the signed-in user, kept across restarts.
    pub fn current_user(&self) -> StoreResult<Option<Member>> {
        self.with_conn(|conn| {
            let body: Option<String> = conn
                .query_row("SELECT body FROM session WHERE key = ?1", [CURRENT_USER_KEY], |row| row.get(0))
                .optional()?;
            body.map(|b| decode::<Member>(&b)).transpose()
        })
    }

    pub fn set_current_user(&self, member: &Member) -> StoreResult<()> {
        let body = serde_json::to_string(member).map_err(|e| StoreError::malformed("session", e))?;
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO session (key, body) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET body = excluded.body",
                (CURRENT_USER_KEY, &body),
            )?;
            Ok(())
        })
    }

    /// Clear the session slot only if `member_id` holds it. Returns whether
    /// it was cleared.
    pub fn clear_current_user_if(&self, member_id: &str) -> StoreResult<bool> {
        self.with_conn_mut(|conn| {
            let cleared = conn.execute(
                "DELETE FROM session WHERE key = ?1 AND json_extract(body, '$.id') = ?2",
                (CURRENT_USER_KEY, member_id),
            )? > 0;
            Ok(cleared)
        })
    }

    // -- Activity log --

    /// Recorded actions, oldest first.
    pub fn activity_log(&self) -> StoreResult<Vec<ActivityEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT action, created_at FROM activity_log ORDER BY id ASC")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(rows
                .into_iter()
                .filter_map(|(action, at)| {
                    let timestamp = at.parse().ok()?;
                    Some(ActivityEntry { action, timestamp })
                })
                .collect())
        })
    }
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(body: &str) -> StoreResult<T> {
    serde_json::from_str(body).map_err(|e| StoreError::malformed(std::any::type_name::<T>(), e))
}

fn encode<T: serde::Serialize>(what: &str, value: &T) -> StoreResult<String> {
    serde_json::to_string(value).map_err(|e| StoreError::malformed(what, e))
}

pub(crate) fn load_all<T: Document>(conn: &Connection) -> StoreResult<Vec<T>> {
    let mut stmt = conn.prepare("SELECT body FROM documents WHERE collection = ?1 ORDER BY seq DESC")?;
    let bodies = stmt
        .query_map([T::COLLECTION.as_str()], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    bodies.iter().map(|b| decode::<T>(b)).collect()
}

pub(crate) fn load_one<T: Document>(conn: &Connection, id: &str) -> StoreResult<Option<T>> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
            (T::COLLECTION.as_str(), id),
            |row| row.get(0),
        )
        .optional()?;

    body.map(|b| decode::<T>(&b)).transpose()
}

pub(crate) fn insert_doc<T: Document>(conn: &Connection, item: &T) -> StoreResult<()> {
    let collection = T::COLLECTION.as_str();
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM documents WHERE collection = ?1 AND id = ?2)",
        (collection, item.id()),
        |row| row.get(0),
    )?;
    if exists {
        return Err(StoreError::DuplicateId {
            collection: T::COLLECTION,
            id: item.id().to_string(),
        });
    }

    let body = encode(collection, item)?;
    conn.execute(
        "INSERT INTO documents (collection, id, seq, body)
         VALUES (?1, ?2, (SELECT COALESCE(MAX(seq), 0) + 1 FROM documents WHERE collection = ?1), ?3)",
        (collection, item.id(), &body),
    )
    .map_err(|e| StoreError::from_insert(T::COLLECTION, e))?;
    Ok(())
}

/// Rewrite an existing record's body, keeping its position.
pub(crate) fn write_doc<T: Document>(conn: &Connection, item: &T) -> StoreResult<()> {
    let body = encode(T::COLLECTION.as_str(), item)?;
    conn.execute(
        "UPDATE documents SET body = ?3 WHERE collection = ?1 AND id = ?2",
        (T::COLLECTION.as_str(), item.id(), &body),
    )
    .map_err(|e| StoreError::from_insert(T::COLLECTION, e))?;
    Ok(())
}

pub(crate) fn load_settings<S: Setting>(conn: &Connection) -> StoreResult<S> {
    let body: Option<String> = conn
        .query_row("SELECT body FROM settings WHERE key = ?1", [S::KEY], |row| row.get(0))
        .optional()?;

    match body {
        Some(b) => decode::<S>(&b),
        None => Ok(S::default()),
    }
}

pub(crate) fn write_settings<S: Setting>(conn: &Connection, settings: &S) -> StoreResult<()> {
    let body = encode(S::KEY, settings)?;
    conn.execute(
        "INSERT INTO settings (key, body) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET body = excluded.body",
        (S::KEY, &body),
    )?;
    Ok(())
}

/// Append to the bounded activity log, dropping the oldest entries.
pub(crate) fn log_activity(conn: &Connection, action: &str) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO activity_log (action, created_at) VALUES (?1, ?2)",
        (action, Utc::now().to_rfc3339()),
    )?;
    conn.execute(
        "DELETE FROM activity_log WHERE id NOT IN
            (SELECT id FROM activity_log ORDER BY id DESC LIMIT ?1)",
        [MAX_LOG_ENTRIES],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chapel_types::models::{ContactMessage, HomeConfig, Leader, LeaderType};
    use serde_json::json;

    fn leader(id: &str, name: &str) -> Leader {
        Leader {
            id: id.to_string(),
            name: name.to_string(),
            position: "Treasurer".to_string(),
            phone: String::new(),
            academic_year: "2025/2026".to_string(),
            image: String::new(),
            kind: LeaderType::Executive,
        }
    }

    fn patch(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn insert_puts_record_first() {
        let db = Database::open_in_memory().unwrap();
        let before = db.list::<Leader>().unwrap().len();

        let item = leader("new-1", "Esi");
        db.insert(item.clone()).unwrap();

        let all = db.list::<Leader>().unwrap();
        assert_eq!(all.len(), before + 1);
        assert_eq!(all[0], item);
        assert_eq!(db.get::<Leader>("new-1").unwrap(), Some(item));
    }

    #[test]
    fn insert_rejects_duplicate_and_invalid() {
        let db = Database::open_in_memory().unwrap();
        db.insert(leader("dup", "Esi")).unwrap();

        let err = db.insert(leader("dup", "Yaw")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId { .. }));

        let err = db.insert(leader("blank", "  ")).unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert!(db.get::<Leader>("blank").unwrap().is_none());
    }

    #[test]
    fn update_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.insert(leader("l1", "Esi")).unwrap();

        let p = patch(json!({ "position": "President", "phone": "024" }));
        let once = db.update::<Leader>("l1", &p).unwrap().unwrap();
        let twice = db.update::<Leader>("l1", &p).unwrap().unwrap();
        assert_eq!(once, twice);
        assert_eq!(db.get::<Leader>("l1").unwrap().unwrap(), once);
        assert_eq!(once.name, "Esi");
    }

    #[test]
    fn update_missing_id_changes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let before = db.list::<Leader>().unwrap();

        let result = db.update::<Leader>("nope", &patch(json!({ "name": "X" }))).unwrap();
        assert!(result.is_none());
        assert_eq!(db.list::<Leader>().unwrap(), before);
    }

    #[test]
    fn update_keeps_position_and_id() {
        let db = Database::open_in_memory().unwrap();
        db.insert(leader("a", "A")).unwrap();
        db.insert(leader("b", "B")).unwrap();

        db.update::<Leader>("a", &patch(json!({ "id": "z", "name": "A2" }))).unwrap();
        let all = db.list::<Leader>().unwrap();
        assert_eq!(all[0].id, "b");
        assert_eq!(all[1].id, "a");
        assert_eq!(all[1].name, "A2");
    }

    #[test]
    fn update_rejects_invalid_merge() {
        let db = Database::open_in_memory().unwrap();
        db.insert(leader("l1", "Esi")).unwrap();

        assert!(db.update::<Leader>("l1", &patch(json!({ "name": "" }))).is_err());
        assert!(db.update::<Leader>("l1", &patch(json!({ "type": 3 }))).is_err());
        assert_eq!(db.get::<Leader>("l1").unwrap().unwrap().name, "Esi");
    }

    #[test]
    fn delete_removes_exactly_one() {
        let db = Database::open_in_memory().unwrap();
        db.insert(leader("gone", "Esi")).unwrap();
        let before = db.list::<Leader>().unwrap().len();

        assert!(db.delete::<Leader>("gone").unwrap());
        assert_eq!(db.list::<Leader>().unwrap().len(), before - 1);

        assert!(!db.delete::<Leader>("gone").unwrap());
        assert_eq!(db.list::<Leader>().unwrap().len(), before - 1);
    }

    #[test]
    fn returned_collection_is_a_copy() {
        let db = Database::open_in_memory().unwrap();
        let mut all = db.list::<ContactMessage>().unwrap();
        let len = all.len();
        all.clear();
        assert_eq!(db.list::<ContactMessage>().unwrap().len(), len);
    }

    #[test]
    fn settings_merge() {
        let db = Database::open_in_memory().unwrap();
        let merged: HomeConfig = db
            .merge_settings(&patch(json!({ "heroTitle": "Welcome home" })))
            .unwrap();
        assert_eq!(merged.hero_title, "Welcome home");
        assert_eq!(merged.address, HomeConfig::default().address);
        assert_eq!(db.get_settings::<HomeConfig>().unwrap(), merged);
    }

    #[test]
    fn email_lookup_folds_case() {
        let db = Database::open_in_memory().unwrap();
        let found = db.find_member_by_email("  ADMIN@Chapel.local").unwrap();
        assert_eq!(found.map(|m| m.email), Some(crate::seed::DEFAULT_ROOT_EMAIL.to_string()));
        assert!(db.find_member_by_email("nobody@chapel.local").unwrap().is_none());
    }

    #[test]
    fn session_slot() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.current_user().unwrap().is_none());

        let admin = db.find_member_by_email(crate::seed::DEFAULT_ROOT_EMAIL).unwrap().unwrap();
        db.set_current_user(&admin).unwrap();
        assert_eq!(db.current_user().unwrap(), Some(admin));
    }

    #[test]
    fn session_slot_is_cleared_only_by_its_holder() {
        let db = Database::open_in_memory().unwrap();
        let admin = db.find_member_by_email(crate::seed::DEFAULT_ROOT_EMAIL).unwrap().unwrap();
        db.set_current_user(&admin).unwrap();

        assert!(!db.clear_current_user_if("someone-else").unwrap());
        assert_eq!(db.current_user().unwrap(), Some(admin.clone()));

        assert!(db.clear_current_user_if(&admin.id).unwrap());
        assert!(db.current_user().unwrap().is_none());
    }

    fn member(id: &str, email: &str) -> Member {
        Member {
            id: id.to_string(),
            full_name: "Esi Quaye".to_string(),
            email: email.to_string(),
            phone: String::new(),
            role: chapel_types::models::Role::Member,
            program: String::new(),
            level: String::new(),
            diocese: String::new(),
            department: String::new(),
            profile_image: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn insert_member_stores_credentials_with_the_record() {
        let db = Database::open_in_memory().unwrap();
        let stored = db.insert_member(member("m1", " Esi@Uni.edu "), Some("hash-1")).unwrap();
        assert_eq!(stored.email, "esi@uni.edu");
        assert_eq!(db.password_hash("m1").unwrap().as_deref(), Some("hash-1"));
    }

    #[test]
    fn member_emails_are_unique_regardless_of_case() {
        let db = Database::open_in_memory().unwrap();
        db.insert_member(member("m1", "esi@uni.edu"), Some("hash-1")).unwrap();

        let err = db.insert_member(member("m2", "ESI@uni.edu"), Some("hash-2")).unwrap_err();
        assert!(matches!(err, StoreError::Taken { field: "email", .. }));
        assert!(db.get::<Member>("m2").unwrap().is_none());
        assert!(db.password_hash("m2").unwrap().is_none());

        db.insert_member(member("m3", "yaw@uni.edu"), None).unwrap();
        let err = db
            .update::<Member>("m3", &patch(json!({ "email": "Esi@Uni.edu" })))
            .unwrap_err();
        assert!(matches!(err, StoreError::Taken { field: "email", .. }));
        assert_eq!(db.get::<Member>("m3").unwrap().unwrap().email, "yaw@uni.edu");
    }

    #[test]
    fn concurrent_inserts_of_one_email_keep_one() {
        let db = std::sync::Arc::new(Database::open_in_memory().unwrap());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let db = db.clone();
                std::thread::spawn(move || db.insert_member(member(&format!("c{}", i), "race@uni.edu"), Some("h")))
            })
            .collect();
        let ok = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|r| r.is_ok())
            .count();
        assert_eq!(ok, 1);
        let members = db.list::<Member>().unwrap();
        assert_eq!(members.iter().filter(|m| m.email == "race@uni.edu").count(), 1);
    }

    #[test]
    fn activity_log_is_bounded() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..(MAX_LOG_ENTRIES + 10) {
            db.insert(leader(&format!("bulk-{}", i), "Bulk")).unwrap();
        }
        let log = db.activity_log().unwrap();
        assert_eq!(log.len() as i64, MAX_LOG_ENTRIES);
        assert!(log.iter().all(|e| e.action == "Added new record to leaders"));
    }
}
