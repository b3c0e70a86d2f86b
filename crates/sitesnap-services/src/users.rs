//! User administration: listing with search, filter and sort, selection for bulk
//! actions, and role management.
//!
//! Managers and admins may list users; only admins change them.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use sitesnap_core::models::{Profile, ProfileUpdate, Role};
use sitesnap_core::AppError;
use sitesnap_db::ProfileStore;
use uuid::Uuid;

use crate::auth::{Principal, PrincipalResolver};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UserSort {
    Name,
    Username,
    Role,
    #[default]
    CreatedAt,
}

impl FromStr for UserSort {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "name" | "full_name" => Ok(UserSort::Name),
            "username" => Ok(UserSort::Username),
            "role" => Ok(UserSort::Role),
            "created" | "created_at" | "date" => Ok(UserSort::CreatedAt),
            other => Err(AppError::InvalidInput(format!("Unknown sort field: {}", other))),
        }
    }
}

/// Filter and ordering for the user list.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    /// Case-insensitive match against full name and username
    pub search: Option<String>,
    pub role: Option<Role>,
    pub sort: UserSort,
    pub descending: bool,
}

impl UserQuery {
    /// Filter and sort `profiles`. Sorting is stable, so ties keep the fetch order.
    pub fn apply(&self, profiles: Vec<Profile>) -> Vec<Profile> {
        let needle = self
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut matched: Vec<Profile> = profiles
            .into_iter()
            .filter(|p| self.role.map_or(true, |role| p.role == role))
            .filter(|p| match &needle {
                None => true,
                Some(needle) => [p.full_name.as_deref(), p.username.as_deref()]
                    .into_iter()
                    .flatten()
                    .any(|field| field.to_lowercase().contains(needle)),
            })
            .collect();

        match self.sort {
            UserSort::Name => matched.sort_by_key(|p| p.display_name().to_lowercase()),
            UserSort::Username => {
                matched.sort_by_key(|p| p.username.clone().unwrap_or_default().to_lowercase())
            }
            UserSort::Role => matched.sort_by_key(|p| p.role),
            UserSort::CreatedAt => matched.sort_by_key(|p| p.created_at),
        }
        if self.descending {
            matched.reverse();
        }
        matched
    }
}

/// Users picked for a bulk action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<Uuid>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` if absent, remove it if present. Returns whether it is now selected.
    pub fn toggle(&mut self, id: Uuid) -> bool {
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    pub fn select_all(&mut self, profiles: &[Profile]) {
        self.ids.extend(profiles.iter().map(|p| p.id));
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn is_selected(&self, id: Uuid) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.ids.iter().copied().collect()
    }
}

/// Result of a bulk role change.
#[derive(Debug, Default, Serialize)]
pub struct BulkOutcome {
    pub updated: Vec<Uuid>,
    pub failed: Vec<(Uuid, String)>,
}

#[derive(Clone)]
pub struct UserDirectory {
    profiles: Arc<dyn ProfileStore>,
    principals: Arc<dyn PrincipalResolver>,
}

impl UserDirectory {
    pub fn new(profiles: Arc<dyn ProfileStore>, principals: Arc<dyn PrincipalResolver>) -> Self {
        Self {
            profiles,
            principals,
        }
    }

    async fn acting(&self, required: Role) -> Result<(Principal, Role), AppError> {
        let principal = self
            .principals
            .current_principal()
            .await?
            .ok_or_else(|| AppError::Unauthorized("Not signed in".to_string()))?;
        let role = self.profiles.get_role(principal.user_id).await?;

        if !role.satisfies(required) {
            tracing::warn!(
                user_id = %principal.user_id,
                role = %role,
                required = %required,
                "User administration denied"
            );
            return Err(AppError::Forbidden(format!(
                "{} role required",
                required.as_str()
            )));
        }
        Ok((principal, role))
    }

    pub async fn list_users(&self, query: &UserQuery) -> Result<Vec<Profile>, AppError> {
        self.acting(Role::Manager).await?;
        let profiles = self.profiles.list_profiles().await?;
        Ok(query.apply(profiles))
    }

    /// Set `role` on every id, one at a time. Individual failures do not stop the run.
    pub async fn bulk_update_role(&self, ids: &[Uuid], role: Role) -> Result<BulkOutcome, AppError> {
        let (admin, _) = self.acting(Role::Admin).await?;
        let mut outcome = BulkOutcome::default();

        for &id in ids {
            if id == admin.user_id && role != Role::Admin {
                outcome
                    .failed
                    .push((id, "admins cannot remove their own admin role".to_string()));
                continue;
            }

            match self.profiles.update_role(id, role).await {
                Ok(_) => outcome.updated.push(id),
                Err(e) => {
                    tracing::warn!(error = %e, user_id = %id, role = %role, "Role update failed");
                    outcome.failed.push((id, e.to_string()));
                }
            }
        }

        tracing::info!(
            role = %role,
            updated = outcome.updated.len(),
            failed = outcome.failed.len(),
            "Bulk role update finished"
        );
        Ok(outcome)
    }

    pub async fn update_user(&self, id: Uuid, update: ProfileUpdate) -> Result<Profile, AppError> {
        let (admin, _) = self.acting(Role::Admin).await?;

        if update.is_empty() {
            return Err(AppError::InvalidInput("Nothing to update".to_string()));
        }
        if id == admin.user_id && update.role.is_some_and(|r| r != Role::Admin) {
            return Err(AppError::InvalidInput(
                "Admins cannot remove their own admin role".to_string(),
            ));
        }

        let profile = self.profiles.update_profile(id, &update).await?;
        tracing::info!(user_id = %id, "User updated");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{MockProfileStore, StaticPrincipal};
    use chrono::{TimeZone, Utc};

    fn profile(name: &str, username: &str, role: Role, day: u32) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            username: Some(username.to_string()),
            full_name: Some(name.to_string()),
            avatar_url: None,
            role,
            created_at: Some(Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()),
            updated_at: None,
        }
    }

    fn people() -> Vec<Profile> {
        vec![
            profile("Ana Ortiz", "ana", Role::Manager, 3),
            profile("Bo Chen", "bchen", Role::User, 1),
            profile("Cy Adams", "cy", Role::Admin, 2),
        ]
    }

    #[test]
    fn query_filters_by_role_and_search() {
        let query = UserQuery {
            search: Some("CH".to_string()),
            ..Default::default()
        };
        let names: Vec<_> = query.apply(people()).into_iter().map(|p| p.username).collect();
        assert_eq!(names, vec![Some("bchen".to_string())]);

        let query = UserQuery {
            role: Some(Role::Admin),
            ..Default::default()
        };
        assert_eq!(query.apply(people()).len(), 1);
    }

    #[test]
    fn query_sorts_by_field_and_direction() {
        let by_role_desc = UserQuery {
            sort: UserSort::Role,
            descending: true,
            ..Default::default()
        };
        let roles: Vec<_> = by_role_desc.apply(people()).iter().map(|p| p.role).collect();
        assert_eq!(roles, vec![Role::Admin, Role::Manager, Role::User]);

        let by_created = UserQuery::default();
        let names: Vec<_> = by_created
            .apply(people())
            .iter()
            .map(|p| p.display_name().to_string())
            .collect();
        assert_eq!(names, vec!["Bo Chen", "Cy Adams", "Ana Ortiz"]);
    }

    #[test]
    fn selection_toggles_and_selects_all() {
        let people = people();
        let mut selection = Selection::new();

        assert!(selection.toggle(people[0].id));
        assert!(!selection.toggle(people[0].id));
        assert!(selection.is_empty());

        selection.select_all(&people);
        assert_eq!(selection.len(), 3);
        assert!(selection.is_selected(people[2].id));

        selection.clear();
        assert!(selection.ids().is_empty());
    }

    fn directory(store: Arc<MockProfileStore>, acting: Uuid) -> UserDirectory {
        UserDirectory::new(store, Arc::new(StaticPrincipal::signed_in(acting)))
    }

    #[tokio::test]
    async fn plain_users_cannot_list() {
        let store = Arc::new(MockProfileStore::new());
        let me = Uuid::new_v4();
        store.insert(me, Role::User);

        let err = directory(store, me)
            .list_users(&UserQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn managers_list_but_cannot_change_roles() {
        let store = Arc::new(MockProfileStore::new());
        let me = Uuid::new_v4();
        store.insert(me, Role::Manager);
        let dir = directory(store, me);

        assert_eq!(dir.list_users(&UserQuery::default()).await.unwrap().len(), 1);
        let err = dir.bulk_update_role(&[me], Role::User).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn bulk_update_skips_self_demotion_and_reports_missing() {
        let store = Arc::new(MockProfileStore::new());
        let admin = Uuid::new_v4();
        let worker = Uuid::new_v4();
        let ghost = Uuid::new_v4();
        store.insert(admin, Role::Admin);
        store.insert(worker, Role::User);

        let outcome = directory(store.clone(), admin)
            .bulk_update_role(&[worker, admin, ghost], Role::Manager)
            .await
            .unwrap();

        assert_eq!(outcome.updated, vec![worker]);
        let failed: Vec<Uuid> = outcome.failed.iter().map(|(id, _)| *id).collect();
        assert_eq!(failed, vec![admin, ghost]);
        assert_eq!(store.role_of(worker), Some(Role::Manager));
        assert_eq!(store.role_of(admin), Some(Role::Admin));
    }

    #[tokio::test]
    async fn update_user_applies_partial_edit() {
        let store = Arc::new(MockProfileStore::new());
        let admin = Uuid::new_v4();
        let worker = Uuid::new_v4();
        store.insert(admin, Role::Admin);
        store.insert(worker, Role::User);

        let updated = directory(store, admin)
            .update_user(
                worker,
                ProfileUpdate {
                    full_name: Some("Dee Park".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.full_name.as_deref(), Some("Dee Park"));
        assert_eq!(updated.role, Role::User);
    }
}
