// Social graph service: the follow edge set and friend-of-friend
// recommendations over it.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::graph::{Direction, EdgeType, GraphNode, GraphStore, NodeLabel};
use crate::models::User;
use crate::views::UserMinimal;

#[derive(Debug, Default, Deserialize)]
pub struct RecommendationQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Clone)]
pub struct SocialService {
    store: Arc<GraphStore>,
}

impl SocialService {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }

    pub async fn follow(&self, current: &User, target_id: i64) -> AppResult<User> {
        if target_id == current.id {
            return Err(AppError::BadRequest(
                "You cannot follow yourself".to_string(),
            ));
        }

        let target = self.user_node(target_id).await?;

        if self
            .store
            .edge_exists(current.id, EdgeType::Following, target_id)
            .await?
        {
            return Err(AppError::BadRequest(
                "Already following that user".to_string(),
            ));
        }

        self.store
            .connect_nodes(current.id, EdgeType::Following, target_id)
            .await?;

        Ok(User::from_node(&target)?)
    }

    pub async fn unfollow(&self, current: &User, target_id: i64) -> AppResult<User> {
        if target_id == current.id {
            return Err(AppError::BadRequest(
                "You cannot unfollow yourself".to_string(),
            ));
        }

        let target = self.user_node(target_id).await?;

        if !self
            .store
            .edge_exists(current.id, EdgeType::Following, target_id)
            .await?
        {
            return Err(AppError::BadRequest(
                "Not following that user".to_string(),
            ));
        }

        self.store
            .disconnect_nodes(current.id, EdgeType::Following, target_id)
            .await?;

        Ok(User::from_node(&target)?)
    }

    /// Friend-of-friend matching: users followed by someone the current
    /// user follows, excluding the current user and anyone already
    /// followed. Deduplicated by id and returned in ascending id order, so
    /// pagination is deterministic.
    pub async fn recommendations(
        &self,
        current: &User,
        query: RecommendationQuery,
    ) -> AppResult<Vec<UserMinimal>> {
        let following = self
            .store
            .neighbors(current.id, EdgeType::Following, Direction::Outgoing)
            .await?;
        let followed_ids: Vec<i64> = following.iter().map(|node| node.id).collect();

        let mut candidates: BTreeMap<i64, GraphNode> = BTreeMap::new();
        for intermediary in &following {
            let second_hop = self
                .store
                .neighbors(intermediary.id, EdgeType::Following, Direction::Outgoing)
                .await?;
            for candidate in second_hop {
                if candidate.id == current.id || followed_ids.contains(&candidate.id) {
                    continue;
                }
                candidates.entry(candidate.id).or_insert(candidate);
            }
        }

        candidates
            .into_values()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|node| UserMinimal::from_node(&node))
            .collect()
    }

    pub async fn list_following(&self, user: &User) -> AppResult<Vec<UserMinimal>> {
        self.one_hop(user.id, Direction::Outgoing).await
    }

    pub async fn list_followers(&self, user: &User) -> AppResult<Vec<UserMinimal>> {
        self.one_hop(user.id, Direction::Incoming).await
    }

    async fn one_hop(&self, user_id: i64, direction: Direction) -> AppResult<Vec<UserMinimal>> {
        self.store
            .neighbors(user_id, EdgeType::Following, direction)
            .await?
            .iter()
            .map(UserMinimal::from_node)
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
