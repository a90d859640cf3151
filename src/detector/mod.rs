/// Two-stage outlier detection core
pub mod forest;
pub mod neighbors;
pub mod refiner;
pub mod threshold;
pub mod tree;

// Re-export commonly used types
pub use forest::{anomaly_score, ForestEnsemble};
pub use neighbors::{euclidean_distance, Neighbor, NeighborCache};
pub use refiner::{OutlierRefiner, Refinement, ScoredPoint, REACH_DISTANCE_EPSILON};
pub use threshold::{
    compute_candidate_threshold, CandidateThreshold, DegenerateDimension, DegenerateReason,
};
pub use tree::{average_path_length, height_limit, PartitionTree, SplitRule, TreeNode};
