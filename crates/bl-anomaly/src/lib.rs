pub mod detector;

pub use detector::{evaluate, AnomalyResult};
