//! Registration, login, and profile edits

use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{found, ServiceError, ServiceResult};
use crate::auth::password::{
    hash_password, validate_password_strength, verify_dummy, verify_password,
};
use crate::models::user::{CreateUser, UpdateUser, User, UserRole};
use crate::storage::{Storage, StorageError};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Account details supplied at sign-up or by an admin
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,

    #[validate(length(max = 100))]
    pub first_name: Option<String>,

    #[validate(length(max = 100))]
    pub last_name: Option<String>,

    #[validate(length(min = 7, max = 20))]
    pub phone_number: Option<String>,

    #[serde(default = "default_role")]
    pub role: UserRole,

    pub vehicle_number: Option<String>,

    pub driver_license_number: Option<String>,
}

fn default_role() -> UserRole {
    UserRole::Customer
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Who is creating the account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Public sign-up: customers and drivers only
    SelfService,

    /// Admin console or startup bootstrap: any role
    Staff,
}

pub async fn register(storage: &dyn Storage, reg: Registration, origin: Origin) -> ServiceResult<User> {
    let email = reg.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ServiceError::validation("A valid email is required"));
    }

    if reg.role == UserRole::Admin && origin == Origin::SelfService {
        return Err(ServiceError::validation("Admin accounts cannot be self-registered"));
    }

    let vehicle_number = non_blank(reg.vehicle_number);
    if reg.role == UserRole::Driver && vehicle_number.is_none() {
        return Err(ServiceError::validation("Vehicle number is required for drivers"));
    }

    validate_password_strength(&reg.password).map_err(ServiceError::Validation)?;
    let password_hash = hash_password(&reg.password)?;

    let user = storage
        .create_user(CreateUser {
            email,
            password_hash,
            first_name: non_blank(reg.first_name),
            last_name: non_blank(reg.last_name),
            phone_number: non_blank(reg.phone_number),
            role: reg.role,
            vehicle_number,
            driver_license_number: non_blank(reg.driver_license_number),
        })
        .await
        .map_err(|e| match e {
            StorageError::Conflict(_) => ServiceError::validation("Email already registered"),
            other => other.into(),
        })?;

    tracing::info!(user_id = %user.id, role = %user.role, "Account created");
    Ok(user)
}

/// Checks credentials and records the login
pub async fn login(storage: &dyn Storage, email: &str, password: &str) -> ServiceResult<User> {
    let Some(user) = storage.get_user_by_email(email.trim()).await? else {
        verify_dummy(password);
        return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS));
    };

    if !verify_password(password, &user.password_hash)? {
        tracing::debug!(user_id = %user.id, "Password mismatch");
        return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS));
    }

    if !user.is_active {
        return Err(ServiceError::AccountDeactivated);
    }

    storage.record_login(user.id).await?;
    found(storage.get_user(user.id).await?, "User")
}

/// Loads the caller, rejecting deactivated accounts
pub async fn current_user(storage: &dyn Storage, user_id: Uuid) -> ServiceResult<User> {
    let user = storage
        .get_user(user_id)
        .await?
        .ok_or(ServiceError::Unauthorized("Unauthorized"))?;
    if !user.is_active {
        return Err(ServiceError::AccountDeactivated);
    }
    Ok(user)
}

/// Fields a user may change on their own profile
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[validate(length(max = 100))]
    pub first_name: Option<String>,

    #[validate(length(max = 100))]
    pub last_name: Option<String>,

    #[validate(length(min = 7, max = 20))]
    pub phone_number: Option<String>,

    #[validate(url)]
    pub profile_image_url: Option<String>,

    pub vehicle_number: Option<String>,

    pub driver_license_number: Option<String>,
}

pub async fn update_profile(
    storage: &dyn Storage,
    user_id: Uuid,
    update: ProfileUpdate,
) -> ServiceResult<User> {
    let data = UpdateUser {
        first_name: non_blank(update.first_name),
        last_name: non_blank(update.last_name),
        phone_number: non_blank(update.phone_number),
        profile_image_url: non_blank(update.profile_image_url),
        vehicle_number: non_blank(update.vehicle_number),
        driver_license_number: non_blank(update.driver_license_number),
        is_active: None,
    };
    found(storage.update_user(user_id, data).await?, "User")
}

/// Creates the configured admin account unless the email already exists
pub async fn ensure_admin(storage: &dyn Storage, email: &str, password: &str) -> ServiceResult<User> {
    if let Some(existing) = storage.get_user_by_email(email).await? {
        return Ok(existing);
    }

    register(
        storage,
        Registration {
            email: email.to_string(),
            password: password.to_string(),
            first_name: Some("Admin".to_string()),
            last_name: None,
            phone_number: None,
            role: UserRole::Admin,
            vehicle_number: None,
            driver_license_number: None,
        },
        Origin::Staff,
    )
    .await
}
