//! Users: authentication, signup and hr administration.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{check_id, non_blank, require_role, ServiceError, ServiceResult, MANAGERS};
use crate::app::App;
use crate::core::{Actor, Role, User, UserStatus};
use crate::store::{Store, StoreError};

/// Body of a signup request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub department: Option<String>,
}

/// Body of an hr update to a user; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(default)]
    pub status: Option<UserStatus>,
    #[serde(default)]
    pub role: Option<Role>,
    /// An empty string clears the department
    #[serde(default)]
    pub department: Option<String>,
}

/// Whether hr may move an account from `from` to `to`.
fn status_change_allowed(from: UserStatus, to: UserStatus) -> bool {
    from == to
        || matches!(
            (from, to),
            (UserStatus::Pending, UserStatus::Active)
                | (UserStatus::Pending, UserStatus::Rejected)
                | (UserStatus::Active, UserStatus::Rejected)
        )
}

/// Validate and store a new account with the given status.
///
/// Shared by signup and the operator commands that seed the first accounts.
pub fn register_user(
    store: &Store,
    input: NewUser,
    status: UserStatus,
    now: DateTime<Utc>,
) -> ServiceResult<User> {
    let Some(name) = non_blank(Some(input.name)) else {
        return Err(ServiceError::Validation("Name is required".to_string()));
    };
    let email = input.email.trim().to_ascii_lowercase();
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(ServiceError::Validation("A valid email is required".to_string()));
    }

    let mut user = User::new(name, email, input.role.unwrap_or(Role::Employee), now);
    user.department = non_blank(input.department);
    user.status = status;

    match store.insert_user(&user) {
        Ok(()) => Ok(user),
        Err(StoreError::Conflict) => {
            Err(ServiceError::Validation("Email already registered".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Activate the account registered under `email`, outside the hr API.
///
/// Follows the same status rules as hr approval; an active account is
/// returned unchanged.
pub fn activate_user(store: &Store, email: &str) -> ServiceResult<User> {
    let email = email.trim().to_ascii_lowercase();
    let mut user = store.find_user_by_email(&email)?.ok_or(ServiceError::NotFound("User"))?;
    if user.status == UserStatus::Active {
        return Ok(user);
    }
    if !status_change_allowed(user.status, UserStatus::Active) {
        return Err(ServiceError::Validation(format!(
            "Cannot change status from {} to {}",
            user.status,
            UserStatus::Active
        )));
    }
    user.status = UserStatus::Active;
    store.update_user(&user)?;
    Ok(user)
}

impl App {
    /// Resolve the acting user from the id forwarded by the auth proxy.
    ///
    /// A missing or unknown id is unauthenticated; an account that is not
    /// active is forbidden.
    pub fn authenticate(&self, user_id: Option<&str>) -> ServiceResult<Actor> {
        let Some(user_id) = user_id.map(str::trim).filter(|id| !id.is_empty()) else {
            return Err(ServiceError::Unauthenticated);
        };
        if check_id(user_id, "user").is_err() {
            return Err(ServiceError::Unauthenticated);
        }
        let user = self.store.get_user(user_id)?.ok_or(ServiceError::Unauthenticated)?;
        if user.status != UserStatus::Active {
            tracing::debug!(user = %user.id, status = %user.status, "Inactive account");
            return Err(ServiceError::Forbidden);
        }
        Ok(Actor::from_user(&user))
    }

    /// Register a new account, pending hr approval.
    pub fn signup(&self, input: NewUser, now: DateTime<Utc>) -> ServiceResult<User> {
        let user = register_user(&self.store, input, UserStatus::Pending, now)?;
        tracing::info!(user = %user.id, role = %user.role, "User signed up");
        Ok(user)
    }

    /// All users, newest first (pm/hr).
    pub fn list_users(&self, actor: &Actor) -> ServiceResult<Vec<User>> {
        require_role(actor, MANAGERS)?;
        Ok(self.store.list_users()?)
    }

    /// Approve, reject, re-role or move a user (hr).
    pub fn update_user(
        &self,
        actor: &Actor,
        user_id: &str,
        patch: UserPatch,
    ) -> ServiceResult<User> {
        require_role(actor, &[Role::Hr])?;
        check_id(user_id, "user")?;
        let mut user = self.store.get_user(user_id)?.ok_or(ServiceError::NotFound("User"))?;

        if let Some(status) = patch.status {
            if !status_change_allowed(user.status, status) {
                return Err(ServiceError::Validation(format!(
                    "Cannot change status from {} to {}",
                    user.status, status
                )));
            }
            user.status = status;
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(department) = patch.department {
            user.department = non_blank(Some(department));
        }

        self.store.update_user(&user)?;
        tracing::info!(
            user = %user.id,
            by = %actor.id,
            status = %user.status,
            role = %user.role,
            "User updated"
        );
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::new_id;
    use crate::service::testing::offline_app;
    use crate::store::fixtures::{active_user, at};

    fn signup(app: &App, name: &str) -> User {
        let input = NewUser {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            ..Default::default()
        };
        app.signup(input, at(1)).unwrap()
    }

    #[test]
    fn test_authenticate() {
        let (app, _) = offline_app();
        let active = active_user(&app.store, "Ana", Role::Employee);
        let pending = signup(&app, "Pen");

        assert_eq!(app.authenticate(Some(&active.id)).unwrap(), Actor::from_user(&active));
        assert!(matches!(app.authenticate(None), Err(ServiceError::Unauthenticated)));
        assert!(matches!(app.authenticate(Some("  ")), Err(ServiceError::Unauthenticated)));
        assert!(matches!(app.authenticate(Some("junk")), Err(ServiceError::Unauthenticated)));
        assert!(matches!(
            app.authenticate(Some(&new_id())),
            Err(ServiceError::Unauthenticated)
        ));
        assert!(matches!(app.authenticate(Some(&pending.id)), Err(ServiceError::Forbidden)));
    }

    #[test]
    fn test_signup_creates_pending_employee() {
        let (app, _) = offline_app();
        let user = signup(&app, "Nia");
        assert_eq!(user.status, UserStatus::Pending);
        assert_eq!(user.role, Role::Employee);
        assert_eq!(user.email, "nia@example.com");

        let twin = NewUser {
            name: "Nia Again".to_string(),
            email: "NIA@example.com".to_string(),
            ..Default::default()
        };
        let err = app.signup(twin, at(2)).unwrap_err();
        assert_eq!(err.to_string(), "Email already registered");

        let bad =
            NewUser { name: "X".to_string(), email: "nope".to_string(), ..Default::default() };
        assert!(matches!(app.signup(bad, at(2)), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_register_active_hr_account() {
        let store = Store::open_in_memory().unwrap();
        let input = NewUser {
            name: " Hana ".to_string(),
            email: "Hana@Example.com".to_string(),
            role: Some(Role::Hr),
            department: Some("People".to_string()),
        };
        let hr = register_user(&store, input, UserStatus::Active, at(1)).unwrap();

        assert_eq!(hr.name, "Hana");
        assert_eq!(hr.email, "hana@example.com");
        assert_eq!(hr.status, UserStatus::Active);
        assert_eq!(hr.role, Role::Hr);
        assert_eq!(store.get_user(&hr.id).unwrap(), Some(hr));
    }

    #[test]
    fn test_activate_user_by_email() {
        let (app, _) = offline_app();
        let pending = signup(&app, "Pen");

        let activated = activate_user(&app.store, " PEN@example.com ").unwrap();
        assert_eq!(activated.id, pending.id);
        assert_eq!(activated.status, UserStatus::Active);
        assert!(app.authenticate(Some(&pending.id)).is_ok());

        // activating twice is a no-op
        assert_eq!(activate_user(&app.store, "pen@example.com").unwrap(), activated);

        let err = activate_user(&app.store, "ghost@example.com").unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("User")));

        let mut rejected = signup(&app, "Rex");
        rejected.status = UserStatus::Rejected;
        app.store.update_user(&rejected).unwrap();
        let err = activate_user(&app.store, "rex@example.com").unwrap_err();
        assert_eq!(err.to_string(), "Cannot change status from rejected to active");
    }

    #[test]
    fn test_list_users_requires_manager() {
        let (app, _) = offline_app();
        let dev = active_user(&app.store, "Dev", Role::Employee);
        let pm = active_user(&app.store, "Pat", Role::Pm);

        assert!(matches!(app.list_users(&Actor::from_user(&dev)), Err(ServiceError::Forbidden)));
        assert_eq!(app.list_users(&Actor::from_user(&pm)).unwrap().len(), 2);
    }

    #[test]
    fn test_hr_approves_and_rejects() {
        let (app, _) = offline_app();
        let hr = Actor::from_user(&active_user(&app.store, "Hana", Role::Hr));
        let pending = signup(&app, "Pen");

        let patch = UserPatch {
            status: Some(UserStatus::Active),
            department: Some("Design".to_string()),
            ..Default::default()
        };
        let approved = app.update_user(&hr, &pending.id, patch).unwrap();
        assert_eq!(approved.status, UserStatus::Active);
        assert_eq!(approved.department.as_deref(), Some("Design"));
        assert!(app.authenticate(Some(&pending.id)).is_ok());

        let patch = UserPatch { status: Some(UserStatus::Rejected), ..Default::default() };
        app.update_user(&hr, &pending.id, patch).unwrap();

        let patch = UserPatch { status: Some(UserStatus::Active), ..Default::default() };
        let err = app.update_user(&hr, &pending.id, patch).unwrap_err();
        assert_eq!(err.to_string(), "Cannot change status from rejected to active");
    }

    #[test]
    fn test_only_hr_updates_users() {
        let (app, _) = offline_app();
        let pm = Actor::from_user(&active_user(&app.store, "Pat", Role::Pm));
        let pending = signup(&app, "Pen");
        let patch = UserPatch { role: Some(Role::Pm), ..Default::default() };
        assert!(matches!(app.update_user(&pm, &pending.id, patch), Err(ServiceError::Forbidden)));

        let hr = Actor::from_user(&active_user(&app.store, "Hana", Role::Hr));
        let err = app.update_user(&hr, &new_id(), UserPatch::default()).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("User")));
    }

    #[test]
    fn test_status_transitions() {
        use UserStatus::*;
        assert!(status_change_allowed(Pending, Active));
        assert!(status_change_allowed(Pending, Rejected));
        assert!(status_change_allowed(Active, Rejected));
        assert!(status_change_allowed(Active, Active));
        assert!(!status_change_allowed(Rejected, Active));
        assert!(!status_change_allowed(Active, Pending));
    }
}
