pub mod buffer;
pub mod decode;
pub mod features;
pub mod onset;
pub mod spectrum;
pub mod tempo;

pub use buffer::AudioBuffer;
pub use features::{FeatureExtractor, FeatureFrame};
pub use onset::{Candidate, OnsetSelector};
pub use tempo::{TempoEstimate, TempoEstimator};
