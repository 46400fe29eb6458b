//! Role gates and per-order access rules

use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::{
    order::{Order, OrderStatus},
    user::UserRole,
};

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// Caller's role is not in the allowed set
    #[error("Forbidden - {} access required", describe(.required))]
    InsufficientRole { required: Vec<UserRole> },

    #[error("Not authorized to access this resource")]
    NotAuthorized,
}

fn describe(roles: &[UserRole]) -> String {
    roles
        .iter()
        .map(|r| r.display_name())
        .collect::<Vec<_>>()
        .join(" or ")
}

pub fn require_role(auth: &AuthContext, role: UserRole) -> Result<(), AuthzError> {
    require_any_role(auth, &[role])
}

pub fn require_any_role(auth: &AuthContext, roles: &[UserRole]) -> Result<(), AuthzError> {
    if roles.contains(&auth.role) {
        Ok(())
    } else {
        Err(AuthzError::InsufficientRole {
            required: roles.to_vec(),
        })
    }
}

/// Caller owns the resource, or is an admin
pub fn require_ownership(auth: &AuthContext, owner_id: Uuid) -> Result<(), AuthzError> {
    if auth.user_id == owner_id || auth.is_admin() {
        Ok(())
    } else {
        Err(AuthzError::NotAuthorized)
    }
}

/// Who may see an order
///
/// Admins see everything, customers their own orders, and drivers the orders
/// assigned to them plus unassigned open orders they could accept.
pub fn can_view_order(auth: &AuthContext, order: &Order) -> bool {
    match auth.role {
        UserRole::Admin => true,
        UserRole::Customer => order.user_id == auth.user_id,
        UserRole::Driver => match order.driver_id {
            Some(driver) => driver == auth.user_id,
            None => matches!(order.status, OrderStatus::Pending | OrderStatus::Processing),
        },
    }
}

pub fn require_order_access(auth: &AuthContext, order: &Order) -> Result<(), AuthzError> {
    if can_view_order(auth, order) {
        Ok(())
    } else {
        Err(AuthzError::NotAuthorized)
    }
}
