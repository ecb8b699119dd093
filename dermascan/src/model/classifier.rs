use crate::error::PipelineError;
use ndarray::Array4;
use ort::{session::Session, value::Tensor};
use std::sync::Mutex;

/// A binary classifier producing one confidence score per image.
pub trait Classifier: Send + Sync {
    fn score(&self, input: Array4<f32>) -> Result<f32, PipelineError>;
}

/// Classifier backed by an ONNX Runtime session.
pub struct OnnxClassifier {
    // `Session::run` needs `&mut self`
    session: Mutex<Session>,
    input_name: String,
}

impl OnnxClassifier {
    pub fn new(session: Session, input_name: String) -> Self {
        Self {
            session: Mutex::new(session),
            input_name,
        }
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }
}

impl Classifier for OnnxClassifier {
    fn score(&self, input: Array4<f32>) -> Result<f32, PipelineError> {
        let shape = input.shape().to_vec();
        let (data, _) = input.as_standard_layout().into_owned().into_raw_vec_and_offset();
        let input_value = Tensor::from_array((shape, data.into_boxed_slice()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| PipelineError::ModelPoisoned)?;
        let outputs = session.run(ort::inputs![self.input_name.as_str() => input_value])?;

        let (_, scores) = outputs[0].try_extract_tensor::<f32>()?;
        let score = scores.first().copied();
        score.ok_or(PipelineError::EmptyOutput)
    }
}
