//! K-means clustering of variable-length sequences under DTW.
//!
//! Centroids are refined by DBA. Each cluster is summarized as a
//! [`Prototype`]: the centroid plus the mean DTW cost of its members.

mod config;
mod error;
mod init;
mod kmeans;
mod result;

pub use config::KMeansConfig;
pub use error::ClusterError;
pub use result::{ClusterLabel, Inertia, KMeansResult, Prototype};
