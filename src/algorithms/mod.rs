pub mod background;
pub mod coalitions;
pub mod counterfactual;
pub mod goal;
pub mod kernel_shap;
pub mod kmeans;

pub use background::{BackgroundGenerator, CounterfactualBackgroundConfig};
pub use counterfactual::{
    CounterfactualConfig, CounterfactualExplainer, CounterfactualRequest, CounterfactualSearch,
};
pub use goal::OutputGoal;
pub use kernel_shap::{KernelShapSamples, Link, ShapConfig, ShapKernelExplainer};
pub use kmeans::KMeans;
