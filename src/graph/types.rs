use serde::{Deserialize, Serialize};

/// Node labels known to the store. Everything in this system is a user or a
/// post; comments are posts distinguished purely by their edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeLabel {
    User,
    Post,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::User => "User",
            NodeLabel::Post => "Post",
        }
    }
}

/// Typed, directed edges. Names mirror the relationship types of the wire
/// schema (`OWNS`, `LINKED_TO`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeType {
    /// User -> Post, exactly one owner per post.
    Owns,
    /// Post -> Post, child comment to its parent.
    LinkedTo,
    /// User -> Post reaction. Mutually exclusive with `Disliked`.
    Liked,
    /// User -> Post reaction. Mutually exclusive with `Liked`.
    Disliked,
    /// User -> User follow edge. Irreflexive, no parallel duplicates.
    Following,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Owns => "OWNS",
            EdgeType::LinkedTo => "LINKED_TO",
            EdgeType::Liked => "LIKED",
            EdgeType::Disliked => "DISLIKED",
            EdgeType::Following => "FOLLOWING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// A raw node as stored: JSON props plus the bookkeeping columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: i64,
    pub label: String,
    pub props: serde_json::Value,
    pub created: i64,
    pub updated: i64,
}

impl GraphNode {
    /// String property accessor; absent or non-string props read as `None`.
    pub fn prop_str(&self, field: &str) -> Option<&str> {
        self.props.get(field).and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone)]
enum Predicate {
    Eq(String, String),
    IContains(String, String),
}

/// Property filter compiled into `json_extract` SQL. Supports the two query
/// shapes the API exposes: exact equality and case-insensitive substring.
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    predicates: Vec<Predicate>,
}

impl NodeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<String>) -> Self {
        self.predicates
            .push(Predicate::Eq(field.to_string(), value.into()));
        self
    }

    pub fn icontains(mut self, field: &str, value: impl Into<String>) -> Self {
        self.predicates
            .push(Predicate::IContains(field.to_string(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Renders the filter as conjoined SQL conditions plus bind values, in
    /// bind order. Field names are interpolated into the `json_extract`
    /// path; they come from code, never from request input.
    pub fn to_sql(&self) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut binds = Vec::new();
        for pred in &self.predicates {
            match pred {
                Predicate::Eq(field, value) => {
                    clauses.push(format!("json_extract(props, '$.{}') = ?", field));
                    binds.push(value.clone());
                }
                Predicate::IContains(field, value) => {
                    clauses.push(format!(
                        "instr(lower(json_extract(props, '$.{}')), lower(?)) > 0",
                        field
                    ));
                    binds.push(value.clone());
                }
            }
        }
        (clauses.join(" AND "), binds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_renders_nothing() {
        let (sql, binds) = NodeFilter::new().to_sql();
        assert!(sql.is_empty());
        assert!(binds.is_empty());
    }

    #[test]
    fn filter_conjoins_predicates_in_order() {
        let (sql, binds) = NodeFilter::new()
            .eq("content", "hello")
            .icontains("content", "ell")
            .to_sql();
        assert_eq!(
            sql,
            "json_extract(props, '$.content') = ? AND \
             instr(lower(json_extract(props, '$.content')), lower(?)) > 0"
        );
        assert_eq!(binds, vec!["hello".to_string(), "ell".to_string()]);
    }

    #[test]
    fn edge_type_names_match_wire_schema() {
        assert_eq!(EdgeType::Owns.as_str(), "OWNS");
        assert_eq!(EdgeType::LinkedTo.as_str(), "LINKED_TO");
        assert_eq!(EdgeType::Following.as_str(), "FOLLOWING");
    }
}
