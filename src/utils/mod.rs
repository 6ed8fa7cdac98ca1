pub mod encoding;
pub mod linalg;
pub mod models;
pub mod rng;

pub use encoding::FeatureEncoder;
