//! Order chat between customers, drivers, and support

use serde::Deserialize;
use std::collections::HashSet;
use uuid::Uuid;

use super::{found, ServiceError, ServiceResult};
use crate::auth::{authorization::require_order_access, middleware::AuthContext};
use crate::models::{
    message::{Message, MessageFilter, NewMessage},
    user::UserRole,
};
use crate::storage::Storage;

pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessage {
    pub content: String,

    pub order_id: Option<Uuid>,

    /// Channel to post to; defaults to the sender's role
    pub role: Option<UserRole>,

    pub receiver_id: Option<Uuid>,
}

pub async fn post_message(storage: &dyn Storage, sender: &AuthContext, post: PostMessage) -> ServiceResult<Message> {
    let content = post.content.trim();
    let chars = content.chars().count();
    if chars == 0 {
        return Err(ServiceError::validation("Message cannot be empty"));
    }
    if chars > MAX_MESSAGE_CHARS {
        return Err(ServiceError::validation(format!(
            "Message cannot exceed {} characters",
            MAX_MESSAGE_CHARS
        )));
    }

    if let Some(order_id) = post.order_id {
        let order = found(storage.get_order(order_id).await?, "Order")?;
        require_order_access(sender, &order.order)?;
    }

    Ok(storage
        .create_message(NewMessage {
            sender_id: Some(sender.user_id),
            receiver_id: post.receiver_id,
            order_id: post.order_id,
            role: Some(post.role.unwrap_or(sender.role)),
            content: content.to_string(),
        })
        .await?)
}

/// Messages the viewer may read, oldest first
///
/// Admins read everything. Everyone else reads the threads of their own
/// orders (or deliveries) and messages sent by or to them.
pub async fn list_messages(
    storage: &dyn Storage,
    viewer: &AuthContext,
    filter: MessageFilter,
) -> ServiceResult<Vec<Message>> {
    let messages = storage.list_messages(filter).await?;
    if viewer.is_admin() {
        return Ok(messages);
    }

    let orders = match viewer.role {
        UserRole::Driver => storage.orders_for_driver(viewer.user_id).await?,
        _ => storage.orders_for_user(viewer.user_id).await?,
    };
    let visible: HashSet<Uuid> = orders.iter().map(|o| o.order.id).collect();

    Ok(messages
        .into_iter()
        .filter(|m| {
            m.sender_id == Some(viewer.user_id)
                || m.receiver_id == Some(viewer.user_id)
                || m.order_id.is_some_and(|id| visible.contains(&id))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::CreateUser;
    use crate::storage::MemoryStorage;

    async fn account(storage: &MemoryStorage, email: &str, role: UserRole) -> AuthContext {
        let user = storage
            .create_user(CreateUser {
                email: email.to_string(),
                password_hash: "x".to_string(),
                first_name: None,
                last_name: None,
                phone_number: None,
                role,
                vehicle_number: None,
                driver_license_number: None,
            })
            .await
            .unwrap();
        AuthContext::new(user.id, role)
    }

    fn post(content: &str) -> PostMessage {
        PostMessage {
            content: content.to_string(),
            order_id: None,
            role: None,
            receiver_id: None,
        }
    }

    #[tokio::test]
    async fn test_length_limits() {
        let storage = MemoryStorage::new();
        let me = account(&storage, "a@x.mw", UserRole::Customer).await;

        assert!(post_message(&storage, &me, post("   ")).await.is_err());
        assert!(post_message(&storage, &me, post(&"a".repeat(2001))).await.is_err());

        let ok = post_message(&storage, &me, post(&"ñ".repeat(2000))).await.unwrap();
        assert_eq!(ok.role, Some(UserRole::Customer));
    }

    #[tokio::test]
    async fn test_visibility() {
        let storage = MemoryStorage::new();
        let alice = account(&storage, "alice@x.mw", UserRole::Customer).await;
        let bob = account(&storage, "bob@x.mw", UserRole::Customer).await;
        let admin = account(&storage, "admin@x.mw", UserRole::Admin).await;

        post_message(&storage, &alice, post("hello support")).await.unwrap();

        let for_bob = list_messages(&storage, &bob, MessageFilter::default()).await.unwrap();
        assert!(for_bob.is_empty());
        let for_alice = list_messages(&storage, &alice, MessageFilter::default()).await.unwrap();
        assert_eq!(for_alice.len(), 1);
        let for_admin = list_messages(&storage, &admin, MessageFilter::default()).await.unwrap();
        assert_eq!(for_admin.len(), 1);
    }

    #[tokio::test]
    async fn test_cannot_post_to_foreign_order() {
        let storage = MemoryStorage::new();
        let alice = account(&storage, "alice@x.mw", UserRole::Customer).await;

        let mut message = post("where is it?");
        message.order_id = Some(Uuid::new_v4());
        assert!(matches!(
            post_message(&storage, &alice, message).await,
            Err(ServiceError::NotFound("Order"))
        ));
    }
}
