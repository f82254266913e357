//! Classifier network.

pub mod melcnn;

pub use melcnn::MelCnn;
