// View assembly: read-side construction of the nested response shapes from
// the raw graph. Rendering is parameterized by the viewing user, whose
// like/dislike edges drive the per-viewer flags.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::graph::{Direction, EdgeType, GraphNode, GraphStore};
use crate::models::User;

#[derive(Debug, Clone, Serialize)]
pub struct UserMinimal {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub bio: String,
    pub avatar_link: String,
}

impl UserMinimal {
    pub fn from_node(node: &GraphNode) -> AppResult<Self> {
        let user = User::from_node(node)?;
        Ok(Self::from_user(&user))
    }

    pub fn from_user(user: &User) -> Self {
        UserMinimal {
            id: user.id,
            username: user.username.clone(),
            full_name: user.full_name.clone(),
            bio: user.bio.clone(),
            avatar_link: user.avatar_link.clone(),
        }
    }
}

/// A post with its reaction aggregates, per-viewer flags, and the full
/// nested comment tree. `owner` is omitted when the post is rendered inside
/// its owner's own profile.
#[derive(Debug, Clone, Serialize)]
pub struct PostDetails {
    pub id: i64,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<UserMinimal>,
    pub likes: i64,
    pub dislikes: i64,
    pub liked_by_me: bool,
    pub disliked_by_me: bool,
    pub comments: Vec<PostDetails>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PostList {
    pub posts: Vec<PostDetails>,
}

#[derive(Debug, Serialize)]
pub struct UserPublic {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub bio: String,
    pub avatar_link: String,
    pub posts: Vec<PostDetails>,
    pub following: Vec<UserMinimal>,
    pub followed_by: Vec<UserMinimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<UserMinimal>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
}

#[derive(Clone)]
pub struct ViewAssembler {
    store: Arc<GraphStore>,
}

impl ViewAssembler {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }

    /// Renders a post with its owner embedded.
    pub async fn post_details(&self, post: &GraphNode, viewer: &User) -> AppResult<PostDetails> {
        let mut owners = HashMap::new();
        self.render_tree(post, viewer, true, &mut owners).await
    }

    /// Renders a post without re-embedding the owner, for use inside that
    /// owner's public profile.
    pub async fn post_details_without_owner(
        &self,
        post: &GraphNode,
        viewer: &User,
    ) -> AppResult<PostDetails> {
        let mut owners = HashMap::new();
        self.render_tree(post, viewer, false, &mut owners).await
    }

    /// Renders a user's public view: profile fields, owned posts (rendered
    /// relative to the viewer, owner elided), and the one-hop follow lists.
    pub async fn user_public(&self, user: &User, viewer: &User) -> AppResult<UserPublic> {
        let mut posts = Vec::new();
        for post_node in self
            .store
            .neighbors(user.id, EdgeType::Owns, Direction::Outgoing)
            .await?
        {
            posts.push(self.post_details_without_owner(&post_node, viewer).await?);
        }

        let following = self
            .store
            .neighbors(user.id, EdgeType::Following, Direction::Outgoing)
            .await?
            .iter()
            .map(UserMinimal::from_node)
            .collect::<AppResult<Vec<_>>>()?;

        let followed_by = self
            .store
            .neighbors(user.id, EdgeType::Following, Direction::Incoming)
            .await?
            .iter()
            .map(UserMinimal::from_node)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(UserPublic {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            bio: user.bio.clone(),
            avatar_link: user.avatar_link.clone(),
            posts,
            following,
            followed_by,
            created_at: user.created_at,
            updated_at: user.updated_at,
        })
    }

    /// Loads the whole comment subtree with a worklist, gathers reaction
    /// data per node, then assembles the nested shape from the in-memory
    /// arena. One traversal per node regardless of thread depth, and no
    /// unbounded recursion against the store.
    async fn render_tree(
        &self,
        root: &GraphNode,
        viewer: &User,
        embed_owner: bool,
        owners: &mut HashMap<i64, UserMinimal>,
    ) -> AppResult<PostDetails> {
        let mut nodes: HashMap<i64, GraphNode> = HashMap::new();
        let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
        let mut visited: HashSet<i64> = HashSet::new();
        let mut queue = VecDeque::new();

        nodes.insert(root.id, root.clone());
        visited.insert(root.id);
        queue.push_back(root.id);

        while let Some(id) = queue.pop_front() {
            // Direct comments: one hop along incoming LINKED_TO, already in
            // created-ascending order from the store.
            let comment_nodes = self
                .store
                .neighbors(id, EdgeType::LinkedTo, Direction::Incoming)
                .await?;

            let mut child_ids = Vec::with_capacity(comment_nodes.len());
            for child in comment_nodes {
                // The comment graph is acyclic by construction; the visited
                // set keeps a corrupted store from looping us forever.
                if visited.insert(child.id) {
                    child_ids.push(child.id);
                    queue.push_back(child.id);
                    nodes.insert(child.id, child);
                }
            }
            children.insert(id, child_ids);
        }

        let mut rendered: HashMap<i64, PostDetails> = HashMap::new();
        let order: Vec<i64> = nodes.keys().copied().collect();
        for id in order {
            let node = &nodes[&id];
            let details = self
                .render_single(node, viewer, embed_owner, owners)
                .await?;
            rendered.insert(id, details);
        }

        Ok(assemble(root.id, &children, &mut rendered))
    }

    /// Renders one post's own fields, counts, and flags; comments are left
    /// empty and attached by `assemble`.
    async fn render_single(
        &self,
        node: &GraphNode,
        viewer: &User,
        embed_owner: bool,
        owners: &mut HashMap<i64, UserMinimal>,
    ) -> AppResult<PostDetails> {
        let post = crate::models::Post::from_node(node)?;

        let likes = self
            .store
            .count_edges(node.id, EdgeType::Liked, Direction::Incoming)
            .await?;
        let dislikes = self
            .store
            .count_edges(node.id, EdgeType::Disliked, Direction::Incoming)
            .await?;
        let liked_by_me = self
            .store
            .edge_exists(viewer.id, EdgeType::Liked, node.id)
            .await?;
        let disliked_by_me = self
            .store
            .edge_exists(viewer.id, EdgeType::Disliked, node.id)
            .await?;

        let owner = if embed_owner {
            Some(self.owner_summary(node.id, owners).await?)
        } else {
            None
        };

        Ok(PostDetails {
            id: post.id,
            content: post.content,
            owner,
            likes,
            dislikes,
            liked_by_me,
            disliked_by_me,
            comments: Vec::new(),
            created_at: post.created_at,
            updated_at: post.updated_at,
        })
    }

    /// Resolves a post's one owner, memoized per render pass so a deep
    /// thread by a single author costs one lookup.
    async fn owner_summary(
        &self,
        post_id: i64,
        owners: &mut HashMap<i64, UserMinimal>,
    ) -> AppResult<UserMinimal> {
        let owner_nodes = self
            .store
            .neighbors(post_id, EdgeType::Owns, Direction::Incoming)
            .await?;

        // Exactly one OWNS edge is expected; take the first if the store
        // ever reports more.
        let owner_node = owner_nodes
            .first()
            .ok_or_else(|| AppError::Internal(format!("post {} has no owner", post_id)))?;

        if let Some(summary) = owners.get(&owner_node.id) {
            return Ok(summary.clone());
        }

        let summary = UserMinimal::from_node(owner_node)?;
        owners.insert(owner_node.id, summary.clone());
        Ok(summary)
    }
}

/// Stitches the flat rendered map into the nested comment tree. Recursion
/// depth is bounded by actual thread depth.
fn assemble(
    id: i64,
    children: &HashMap<i64, Vec<i64>>,
    rendered: &mut HashMap<i64, PostDetails>,
) -> PostDetails {
    let mut details = rendered
        .remove(&id)
        .expect("every node in the children map was rendered");
    if let Some(child_ids) = children.get(&id) {
        details.comments = child_ids
            .iter()
            .map(|child| assemble(*child, children, rendered))
            .collect();
    }
    details
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn details(id: i64) -> PostDetails {
        PostDetails {
            id,
            content: "x".to_string(),
            owner: None,
            likes: 0,
            dislikes: 0,
            liked_by_me: false,
            disliked_by_me: false,
            comments: Vec::new(),
            created_at: Utc.timestamp_opt(0, 0).unwrap(),
            updated_at: Utc.timestamp_opt(0, 0).unwrap(),
        }
    }

    #[test]
    fn assemble_nests_children_in_listed_order() {
        let mut rendered: HashMap<i64, PostDetails> =
            [(1, details(1)), (2, details(2)), (3, details(3))].into();
        let children: HashMap<i64, Vec<i64>> =
            [(1, vec![2, 3]), (2, vec![]), (3, vec![])].into();

        let tree = assemble(1, &children, &mut rendered);
        assert_eq!(tree.id, 1);
        assert_eq!(
            tree.comments.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![2, 3]
        );
    }

    #[test]
    fn owner_field_is_elided_when_absent() {
        let json = serde_json::to_value(details(7)).unwrap();
        assert!(json.get("owner").is_none());
    }
}
