use serde_json::{Map, Value};
use tracing::info;
use uuid::Uuid;

use chapel_types::models::{Member, Role};
use chapel_types::validate::normalize_email;

use crate::{Api, ApiError, ApiResult};

/// Member directory. Same contract as a plain collection, plus the rules
/// that keep email unique and the root account in place.
pub struct Members<'a> {
    api: &'a Api,
}

impl<'a> Members<'a> {
    pub(crate) fn new(api: &'a Api) -> Self {
        Self { api }
    }

    fn is_root(&self, member: &Member) -> bool {
        normalize_email(&member.email) == self.api.root_email()
    }

    pub async fn list(&self) -> ApiResult<Vec<Member>> {
        self.api.collection::<Member>().list().await
    }

    pub async fn get(&self, id: &str) -> ApiResult<Option<Member>> {
        self.api.collection::<Member>().get(id).await
    }

    pub async fn find_by_email(&self, email: &str) -> ApiResult<Option<Member>> {
        let email = email.to_string();
        self.api.run(move |db| db.find_member_by_email(&email)).await
    }

    /// Add a member record without credentials, as the back office does.
    pub async fn create(&self, mut member: Member) -> ApiResult<Member> {
        member.email = normalize_email(&member.email);
        if member.id.trim().is_empty() {
            member.id = Uuid::new_v4().to_string();
        }

        self.api.run(move |db| db.insert_member(member, None)).await
    }

    /// Shallow merge. The root account keeps its email and admin role; an
    /// email held by another member is a conflict.
    pub async fn update(&self, id: &str, mut patch: Map<String, Value>) -> ApiResult<Option<Member>> {
        let Some(current) = self.get(id).await? else {
            return Ok(None);
        };

        if let Some(Value::String(email)) = patch.get_mut("email") {
            *email = normalize_email(email);
            if *email != normalize_email(&current.email) && self.is_root(&current) {
                return Err(ApiError::Forbidden("the root account's email cannot change".to_string()));
            }
        }

        if self.is_root(&current) {
            if let Some(role) = patch.get("role") {
                if role != "admin" {
                    return Err(ApiError::Forbidden("the root account cannot be demoted".to_string()));
                }
            }
        }

        self.api.collection::<Member>().update(id, patch).await
    }

    pub async fn update_role(&self, id: &str, role: Role) -> ApiResult<Option<Member>> {
        let Some(current) = self.get(id).await? else {
            return Ok(None);
        };
        if self.is_root(&current) && role != Role::Admin {
            return Err(ApiError::Forbidden("the root account cannot be demoted".to_string()));
        }

        let id = id.to_string();
        let updated = self
            .api
            .run(move |db| db.modify::<Member, _>(&id, |m| m.role = role))
            .await?;
        if let Some(m) = &updated {
            info!("Member {} role set to {:?}", m.id, m.role);
        }
        Ok(updated)
    }

    /// Removes the record and its credentials. The root account cannot be deleted.
    pub async fn delete(&self, id: &str) -> ApiResult<bool> {
        let Some(current) = self.get(id).await? else {
            return Ok(false);
        };
        if self.is_root(&current) {
            return Err(ApiError::Forbidden("the root account cannot be deleted".to_string()));
        }

        let id = id.to_string();
        self.api
            .run(move |db| {
                let removed = db.delete::<Member>(&id)?;
                if removed {
                    db.remove_credentials(&id)?;
                }
                Ok(removed)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use chapel_types::api::RegisterRequest;
    use serde_json::json;

    fn registration(email: &str) -> RegisterRequest {
        RegisterRequest {
            full_name: "Kwame Mensah".into(),
            email: email.into(),
            password: "correct horse".into(),
            phone: String::new(),
            program: "BSc Physics".into(),
            level: "200".into(),
            diocese: "Kumasi".into(),
            department: "Choir".into(),
        }
    }

    #[tokio::test]
    async fn root_cannot_be_demoted_or_deleted() {
        let (api, _) = testing::api();
        let root = api.members().find_by_email("admin@chapel.local").await.unwrap().unwrap();

        let err = api.members().update_role(&root.id, Role::Member).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        let patch = json!({ "role": "guest" }).as_object().cloned().unwrap();
        assert!(matches!(api.members().update(&root.id, patch).await, Err(ApiError::Forbidden(_))));

        assert!(matches!(api.members().delete(&root.id).await, Err(ApiError::Forbidden(_))));
        assert_eq!(api.members().get(&root.id).await.unwrap().unwrap().role, Role::Admin);
    }

    #[tokio::test]
    async fn other_members_change_role() {
        let (api, _) = testing::api();
        let member = api.auth().register(registration("kwame@uni.edu")).await.unwrap();

        let promoted = api.members().update_role(&member.id, Role::Secretary).await.unwrap().unwrap();
        assert_eq!(promoted.role, Role::Secretary);
        assert!(api.members().update_role("ghost", Role::Admin).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn email_stays_unique() {
        let (api, _) = testing::api();
        api.auth().register(registration("kwame@uni.edu")).await.unwrap();

        let err = api.auth().register(registration("KWAME@uni.edu")).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        let other = api.auth().register(registration("ama@uni.edu")).await.unwrap();
        let patch = json!({ "email": "Kwame@Uni.edu" }).as_object().cloned().unwrap();
        assert!(matches!(api.members().update(&other.id, patch).await, Err(ApiError::Conflict(_))));
    }

    #[tokio::test]
    async fn back_office_create_shares_the_email_rule() {
        let (api, _) = testing::api();
        api.auth().register(registration("kwame@uni.edu")).await.unwrap();

        let mut member = api.members().find_by_email("kwame@uni.edu").await.unwrap().unwrap();
        member.id = String::new();
        member.email = " Kwame@Uni.EDU".into();
        assert!(matches!(api.members().create(member).await, Err(ApiError::Conflict(_))));
        assert_eq!(api.members().list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn configured_root_is_protected() {
        let db = chapel_db::Database::open_in_memory_with_root("rector@uni.edu").unwrap();
        let api = Api::new(db, crate::ApiConfig::default());
        assert_eq!(api.root_email(), "rector@uni.edu");

        assert!(api.auth().bootstrap_root("rector password").await.unwrap());
        let root = api.auth().login("rector@uni.edu", "rector password").await.unwrap().user;
        assert_eq!(root.role, Role::Admin);

        assert!(matches!(api.members().delete(&root.id).await, Err(ApiError::Forbidden(_))));
        assert!(matches!(
            api.members().update_role(&root.id, Role::Guest).await,
            Err(ApiError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn delete_removes_member_and_login() {
        let (api, _) = testing::api();
        let member = api.auth().register(registration("kwame@uni.edu")).await.unwrap();

        assert!(api.members().delete(&member.id).await.unwrap());
        assert!(!api.members().delete(&member.id).await.unwrap());
        assert!(api.auth().login("kwame@uni.edu", "correct horse").await.is_err());
    }
}
