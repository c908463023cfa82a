//! DTW alignment cost, warping paths and DBA barycenter averaging over
//! multivariate sequences.
//!
//! Pure math library, zero I/O. Sequences are stored flat in row-major
//! order and may differ in length. The per-sample cost is pluggable through
//! [`DistanceMetric`]; [`Manhattan`] is the default.

mod dba;
mod distance;
mod dtw;
mod error;
mod matrix;
mod metric;
mod path;
mod sequence;

pub use dba::{DbaConfig, DbaResult};
pub use distance::DtwDistance;
pub use dtw::Dtw;
pub use error::{DbaError, DtwError};
pub use matrix::DistanceMatrix;
pub use metric::{DistanceMetric, Manhattan};
pub use path::{WarpingPath, WarpingStep};
pub use sequence::{Sequence, SequenceView};
