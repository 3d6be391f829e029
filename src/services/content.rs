// Content service: post CRUD with ownership enforcement, comment threading
// over LINKED_TO edges, and the like/dislike toggle state machine.

use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::graph::{Direction, EdgeType, GraphNode, GraphStore, NodeFilter, NodeLabel};
use crate::models::{Post, User};

#[derive(Debug, Deserialize)]
pub struct PostInput {
    pub content: String,
}

/// GET /posts/feed filters. An exact `content` match narrows the feed; a
/// `content_i` substring match narrows it further when both are given.
#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub content: Option<String>,
    pub content_i: Option<String>,
}

#[derive(Clone)]
pub struct ContentService {
    store: Arc<GraphStore>,
}

impl ContentService {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }

    pub async fn create_post(&self, current: &User, content: &str) -> AppResult<Post> {
        validate_content(content)?;

        let node = self
            .store
            .create_node(NodeLabel::Post, &Post::props(content))
            .await?;
        self.store
            .connect_nodes(current.id, EdgeType::Owns, node.id)
            .await?;

        Ok(Post::from_node(&node)?)
    }

    /// Creates a comment under an existing post and returns the refreshed
    /// parent node. The LINKED_TO edge runs child -> parent, and only ever
    /// points at a pre-existing post, which keeps comment trees acyclic.
    pub async fn create_comment(
        &self,
        current: &User,
        parent_id: i64,
        content: &str,
    ) -> AppResult<GraphNode> {
        let parent = self.post_node(parent_id).await?;
        validate_content(content)?;

        let node = self
            .store
            .create_node(NodeLabel::Post, &Post::props(content))
            .await?;
        self.store
            .connect_nodes(current.id, EdgeType::Owns, node.id)
            .await?;
        self.store
            .connect_nodes(node.id, EdgeType::LinkedTo, parent.id)
            .await?;

        self.post_node(parent_id).await
    }

    pub async fn get_post(&self, post_id: i64) -> AppResult<GraphNode> {
        self.post_node(post_id).await
    }

    pub async fn update_post(
        &self,
        current: &User,
        post_id: i64,
        content: &str,
    ) -> AppResult<GraphNode> {
        self.post_node(post_id).await?;

        // Ownership is membership in the user's owned-post edge set, not a
        // denormalized owner field on the post.
        if !self
            .store
            .edge_exists(current.id, EdgeType::Owns, post_id)
            .await?
        {
            return Err(AppError::BadRequest(
                "User doesn't own that post".to_string(),
            ));
        }

        validate_content(content)?;

        self.store
            .update_node(post_id, &Post::props(content))
            .await?;

        self.post_node(post_id).await
    }

    /// Cascade delete: removes the post and its entire comment subtree.
    /// Children are deleted before their parents, in one transaction, so no
    /// dangling LINKED_TO edges survive a partial failure.
    pub async fn delete_post(&self, post_id: i64) -> AppResult<()> {
        self.post_node(post_id).await?;

        let mut order = vec![post_id];
        let mut queue = VecDeque::from([post_id]);
        while let Some(id) = queue.pop_front() {
            for child in self
                .store
                .neighbors(id, EdgeType::LinkedTo, Direction::Incoming)
                .await?
            {
                order.push(child.id);
                queue.push_back(child.id);
            }
        }

        order.reverse();
        self.store.delete_nodes(&order).await?;
        Ok(())
    }

    pub async fn toggle_like(&self, current: &User, post_id: i64) -> AppResult<GraphNode> {
        self.toggle(current, post_id, EdgeType::Liked, EdgeType::Disliked)
            .await
    }

    pub async fn toggle_dislike(&self, current: &User, post_id: i64) -> AppResult<GraphNode> {
        self.toggle(current, post_id, EdgeType::Disliked, EdgeType::Liked)
            .await
    }

    /// The reaction state machine. A (user, post) pair is in one of three
    /// states: neutral, liked, or disliked. Toggling the held reaction
    /// releases it; toggling the other reaction switches to it. The
    /// opposite edge is always dropped before the new one is written, so
    /// the two reaction types stay mutually exclusive.
    async fn toggle(
        &self,
        current: &User,
        post_id: i64,
        reaction: EdgeType,
        opposite: EdgeType,
    ) -> AppResult<GraphNode> {
        let post = self.post_node(post_id).await?;

        if self.store.edge_exists(current.id, reaction, post_id).await? {
            self.store
                .disconnect_nodes(current.id, reaction, post_id)
                .await?;
        } else {
            self.store
                .disconnect_nodes(current.id, opposite, post_id)
                .await?;
            self.store
                .connect_nodes(current.id, reaction, post_id)
                .await?;
        }

        Ok(post)
    }

    pub async fn list_feed(&self, query: FeedQuery) -> AppResult<Vec<GraphNode>> {
        let mut filter = NodeFilter::new();
        if let Some(content) = query.content {
            filter = filter.eq("content", content);
        }
        if let Some(content_i) = query.content_i {
            filter = filter.icontains("content", content_i);
        }

        Ok(self
            .store
            .find_many(NodeLabel::Post, &filter, None, None)
            .await?)
    }

    async fn post_node(&self, id: i64) -> AppResult<GraphNode> {
        self.store
            .get_node(id)
            .await?
            .filter(|node| node.label == NodeLabel::Post.as_str())
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
    }
}

fn validate_content(content: &str) -> AppResult<()> {
    if content.trim().is_empty() {
        return Err(AppError::BadRequest("Content can't be empty".to_string()));
    }
    Ok(())
}
