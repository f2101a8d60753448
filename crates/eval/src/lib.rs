pub mod correlation;
pub mod distribution;
pub mod node_property;
pub mod special;
pub mod statistics;

pub use correlation::{Correlation, spearman};
pub use distribution::{DistributionComparison, DistributionFitter, MleFitter, UnavailableFitter};
pub use node_property::{NodePropertyPredictor, NodePropertyReport};
pub use statistics::{
    CentralityCorrelations, CommunityQuality, Estimate, StatisticalValidator, ValidationReport,
};
