//! User model and database operations
//!
//! One table holds every account. The `role` column decides which console a
//! user can reach; the driver columns are only meaningful for drivers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Storefront customer
    Customer,

    /// Inventory and order console
    Admin,

    /// Delivery app
    Driver,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Admin => "admin",
            UserRole::Driver => "driver",
        }
    }

    /// Title-cased name used in access-denied messages
    pub fn display_name(&self) -> &'static str {
        match self {
            UserRole::Customer => "Customer",
            UserRole::Admin => "Admin",
            UserRole::Driver => "Driver",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(UserRole::Customer),
            "admin" => Ok(UserRole::Admin),
            "driver" => Ok(UserRole::Driver),
            other => Err(format!("Invalid role: {}", other)),
        }
    }
}

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,

    pub email: String,

    /// Argon2id hash, never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub first_name: Option<String>,

    pub last_name: Option<String>,

    pub phone_number: Option<String>,

    pub profile_image_url: Option<String>,

    pub role: UserRole,

    pub is_active: bool,

    pub vehicle_number: Option<String>,

    pub driver_license_number: Option<String>,

    pub current_latitude: Option<f64>,

    pub current_longitude: Option<f64>,

    pub is_available_for_delivery: bool,

    pub total_deliveries: i32,

    pub average_rating: f64,

    pub last_login_at: Option<DateTime<Utc>>,

    pub login_count: i32,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Builds a fresh in-memory user row from creation input
    pub fn from_create(data: CreateUser) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: data.email,
            password_hash: data.password_hash,
            first_name: data.first_name,
            last_name: data.last_name,
            phone_number: data.phone_number,
            profile_image_url: None,
            role: data.role,
            is_active: true,
            vehicle_number: data.vehicle_number,
            driver_license_number: data.driver_license_number,
            current_latitude: None,
            current_longitude: None,
            is_available_for_delivery: false,
            total_deliveries: 0,
            average_rating: 0.0,
            last_login_at: None,
            login_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// "First Last", falling back to the email address
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if name.is_empty() {
            self.email.clone()
        } else {
            name
        }
    }

    /// Last reported position, if the driver has sent one
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.current_latitude, self.current_longitude) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub email: String,

    pub password_hash: String,

    pub first_name: Option<String>,

    pub last_name: Option<String>,

    pub phone_number: Option<String>,

    pub role: UserRole,

    pub vehicle_number: Option<String>,

    pub driver_license_number: Option<String>,
}

/// Input for updating a user
///
/// `None` leaves a column untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    pub first_name: Option<String>,

    pub last_name: Option<String>,

    pub phone_number: Option<String>,

    pub profile_image_url: Option<String>,

    pub vehicle_number: Option<String>,

    pub driver_license_number: Option<String>,

    pub is_active: Option<bool>,
}

impl UpdateUser {
    /// Applies the present fields to an in-memory user
    pub fn apply(self, user: &mut User) {
        if let Some(v) = self.first_name {
            user.first_name = Some(v);
        }
        if let Some(v) = self.last_name {
            user.last_name = Some(v);
        }
        if let Some(v) = self.phone_number {
            user.phone_number = Some(v);
        }
        if let Some(v) = self.profile_image_url {
            user.profile_image_url = Some(v);
        }
        if let Some(v) = self.vehicle_number {
            user.vehicle_number = Some(v);
        }
        if let Some(v) = self.driver_license_number {
            user.driver_license_number = Some(v);
        }
        if let Some(v) = self.is_active {
            user.is_active = v;
        }
        user.updated_at = Utc::now();
    }
}

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, phone_number, \
     profile_image_url, role, is_active, vehicle_number, driver_license_number, \
     current_latitude, current_longitude, is_available_for_delivery, total_deliveries, \
     average_rating, last_login_at, login_count, created_at, updated_at";

impl User {
    /// Inserts a new user
    ///
    /// # Errors
    ///
    /// Returns a database error on a duplicate email (`users_email_key`).
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, phone_number,
                               role, vehicle_number, driver_license_number)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(data.email)
            .bind(data.password_hash)
            .bind(data.first_name)
            .bind(data.last_name)
            .bind(data.phone_number)
            .bind(data.role)
            .bind(data.vehicle_number)
            .bind(data.driver_license_number)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Case-insensitive email lookup
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)");
        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                phone_number = COALESCE($4, phone_number),
                profile_image_url = COALESCE($5, profile_image_url),
                vehicle_number = COALESCE($6, vehicle_number),
                driver_license_number = COALESCE($7, driver_license_number),
                is_active = COALESCE($8, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(data.first_name)
            .bind(data.last_name)
            .bind(data.phone_number)
            .bind(data.profile_image_url)
            .bind(data.vehicle_number)
            .bind(data.driver_license_number)
            .bind(data.is_active)
            .fetch_optional(pool)
            .await
    }

    /// Bumps `login_count` and stamps `last_login_at`
    pub async fn record_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET last_login_at = NOW(), login_count = login_count + 1
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists users, optionally restricted to one role, newest first
    pub async fn list(pool: &PgPool, role: Option<UserRole>) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE ($1::user_role IS NULL OR role = $1)
            ORDER BY created_at DESC
            "#
        );
        sqlx::query_as::<_, User>(&query)
            .bind(role)
            .fetch_all(pool)
            .await
    }

    pub async fn update_location(
        pool: &PgPool,
        id: Uuid,
        latitude: f64,
        longitude: f64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET current_latitude = $2, current_longitude = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(latitude)
        .bind(longitude)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_availability(
        pool: &PgPool,
        id: Uuid,
        available: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE users SET is_available_for_delivery = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(available)
            .fetch_optional(pool)
            .await
    }

    pub async fn increment_deliveries(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET total_deliveries = total_deliveries + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Active drivers that have switched themselves to available
    pub async fn available_drivers(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {USER_COLUMNS} FROM users
            WHERE role = 'driver' AND is_active AND is_available_for_delivery
            ORDER BY total_deliveries ASC, created_at ASC
            "#
        );
        sqlx::query_as::<_, User>(&query).fetch_all(pool).await
    }
}
