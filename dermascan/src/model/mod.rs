pub mod classifier;
pub mod handle;
pub mod loader;

pub use classifier::{Classifier, OnnxClassifier};
pub use handle::{ModelHandle, ModelStatus};
