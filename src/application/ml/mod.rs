#[cfg(feature = "onnx")]
pub mod onnx_predictor;
pub mod predictor;
pub mod scaler;
pub mod sequence;
