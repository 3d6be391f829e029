use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::graph::GraphNode;

/// A user node. `password_digest` lives in the node props but never leaves
/// the process in a response body.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub bio: String,
    pub avatar_link: String,
    #[serde(skip_serializing)]
    pub password_digest: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct UserProps {
    username: String,
    email: String,
    full_name: String,
    #[serde(default)]
    bio: String,
    #[serde(default)]
    avatar_link: String,
    #[serde(default)]
    password_digest: String,
}

impl User {
    pub fn from_node(node: &GraphNode) -> Result<Self> {
        let props: UserProps = serde_json::from_value(node.props.clone())?;
        Ok(User {
            id: node.id,
            username: props.username,
            email: props.email,
            full_name: props.full_name,
            bio: props.bio,
            avatar_link: props.avatar_link,
            password_digest: props.password_digest,
            created_at: timestamp(node.created)?,
            updated_at: timestamp(node.updated)?,
        })
    }

    pub fn props(&self) -> serde_json::Value {
        json!({
            "username": self.username,
            "email": self.email,
            "full_name": self.full_name,
            "bio": self.bio,
            "avatar_link": self.avatar_link,
            "password_digest": self.password_digest,
        })
    }
}

/// A post node. Top-level posts and comments share this shape; threading is
/// carried entirely by `LINKED_TO` edges.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn from_node(node: &GraphNode) -> Result<Self> {
        let content = node
            .prop_str("content")
            .ok_or_else(|| anyhow!("post node {} has no content", node.id))?
            .to_string();
        Ok(Post {
            id: node.id,
            content,
            created_at: timestamp(node.created)?,
            updated_at: timestamp(node.updated)?,
        })
    }

    pub fn props(content: &str) -> serde_json::Value {
        json!({ "content": content })
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| anyhow!("timestamp {} out of range", secs))
}
