// Identity and credential service: user CRUD, uniqueness enforcement, and
// login against stored Argon2 digests.

use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::graph::{Direction, EdgeType, GraphNode, GraphStore, NodeFilter, NodeLabel};
use crate::models::User;
use crate::security::{self, Security};

#[derive(Debug, Deserialize)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub avatar_link: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserInput {
    pub full_name: String,
    pub password: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub avatar_link: String,
}

/// GET /users filter set. Exact matches narrow first; `_i` variants narrow
/// further with case-insensitive substring matching.
#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub name: Option<String>,
    pub name_i: Option<String>,
    pub username: Option<String>,
    pub username_i: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Clone)]
pub struct IdentityService {
    store: Arc<GraphStore>,
    security: Security,
}

impl IdentityService {
    pub fn new(store: Arc<GraphStore>, security: Security) -> Self {
        Self { store, security }
    }

    pub async fn create_user(&self, input: CreateUserInput) -> AppResult<User> {
        // Username uniqueness is checked before email so the username
        // message wins when both collide.
        if self
            .store
            .find_one(NodeLabel::User, &NodeFilter::new().eq("username", &*input.username))
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "User with the same username exists".to_string(),
            ));
        }

        if self
            .store
            .find_one(NodeLabel::User, &NodeFilter::new().eq("email", &*input.email))
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "User with the same email exists".to_string(),
            ));
        }

        let digest = security::hash_password(input.password).await?;

        let props = serde_json::json!({
            "username": input.username,
            "email": input.email,
            "full_name": input.full_name,
            "bio": input.bio,
            "avatar_link": input.avatar_link,
            "password_digest": digest,
        });

        let node = self.store.create_node(NodeLabel::User, &props).await?;
        Ok(User::from_node(&node)?)
    }

    /// Exact-username login. Absent users and bad passwords fail the same
    /// way so the response does not leak which usernames exist.
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<String> {
        let node = self
            .store
            .find_one(NodeLabel::User, &NodeFilter::new().eq("username", username))
            .await?
            .ok_or_else(|| AppError::Unauthorized("User credentials not valid".to_string()))?;

        let user = User::from_node(&node)?;

        let valid =
            security::verify_password(password.to_string(), user.password_digest.clone()).await?;
        if !valid {
            return Err(AppError::Unauthorized(
                "User credentials not valid".to_string(),
            ));
        }

        self.security.issue_token(&user.username)
    }

    pub async fn get_user_by_username(&self, username: &str) -> AppResult<User> {
        let node = self
            .store
            .find_one(NodeLabel::User, &NodeFilter::new().eq("username", username))
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        Ok(User::from_node(&node)?)
    }

    pub async fn get_user_by_id(&self, id: i64) -> AppResult<User> {
        let node = self.user_node(id).await?;
        Ok(User::from_node(&node)?)
    }

    pub async fn update_user(&self, id: i64, input: UpdateUserInput) -> AppResult<User> {
        let node = self.user_node(id).await?;
        let mut user = User::from_node(&node)?;

        user.full_name = input.full_name;
        user.bio = input.bio;
        user.avatar_link = input.avatar_link;
        user.password_digest = security::hash_password(input.password).await?;

        self.store.update_node(id, &user.props()).await?;

        self.get_user_by_id(id).await
    }

    /// Removes the user together with their posts (and those posts' comment
    /// subtrees), so no post is left without an owner.
    pub async fn delete_user(&self, id: i64) -> AppResult<()> {
        self.user_node(id).await?;

        let mut doomed = Vec::new();
        let mut queue: VecDeque<i64> = self
            .store
            .neighbors(id, EdgeType::Owns, Direction::Outgoing)
            .await?
            .iter()
            .map(|node| node.id)
            .collect();
        doomed.extend(queue.iter().copied());

        while let Some(post_id) = queue.pop_front() {
            for child in self
                .store
                .neighbors(post_id, EdgeType::LinkedTo, Direction::Incoming)
                .await?
            {
                if !doomed.contains(&child.id) {
                    doomed.push(child.id);
                    queue.push_back(child.id);
                }
            }
        }

        doomed.reverse();
        doomed.push(id);
        self.store.delete_nodes(&doomed).await?;
        Ok(())
    }

    pub async fn list_users(&self, query: UserQuery) -> AppResult<Vec<User>> {
        let mut filter = NodeFilter::new();
        if let Some(name) = query.name {
            filter = filter.eq("full_name", name);
        }
        if let Some(name_i) = query.name_i {
            filter = filter.icontains("full_name", name_i);
        }
        if let Some(username) = query.username {
            filter = filter.eq("username", username);
        }
        if let Some(username_i) = query.username_i {
            filter = filter.icontains("username", username_i);
        }

        let nodes = self
            .store
            .find_many(NodeLabel::User, &filter, query.limit, query.offset)
            .await?;

        nodes
            .iter()
            .map(|node| User::from_node(node).map_err(AppError::from))
            .collect()
    }

    async fn user_node(&self, id: i64) -> AppResult<GraphNode> {
        self.store
            .get_node(id)
            .await?
            .filter(|node| node.label == NodeLabel::User.as_str())
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}
