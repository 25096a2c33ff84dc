//! Data preprocessing module
//!
//! Holds the standardization stage of the training pipeline. It is fitted on
//! the training split only and lowered to an ONNX `Scaler` node on export.

mod scaler;

pub use scaler::{StandardScaler, ScalerParams};
