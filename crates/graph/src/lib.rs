pub mod neighbors;
pub mod store;

pub use neighbors::{
    AdjacencyRow, EdgeKind, NeighborRecord, NodeContent, PaperRef, PeerRecord, PeerRelationship,
    fold_adjacency,
};
pub use store::{GraphStats, GraphStore};
