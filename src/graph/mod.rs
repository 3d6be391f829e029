// Property-graph store over SQLite: typed nodes plus typed, directed edges.

pub mod store;
pub mod types;

pub use store::GraphStore;
pub use types::{Direction, EdgeType, GraphNode, NodeFilter, NodeLabel};
