// ============================================================
// Layer 5 — Evaluation Loop
// ============================================================
// Runs a model over a sequence of labelled batches and reports
// top-1 accuracy plus the time spent in inference.
//
// Callers pass an inference-mode model: `model.valid()` moves
// an autodiff model to its inner backend, where dropout is the
// identity, BatchNorm uses running statistics and no gradient
// graph is recorded.
//
//   per batch:  logits → softmax(dim 1) → argmax → == label
//   result:     accuracy = 100 · correct / total
//
// The batch sequence is consumed exactly once. The whole loop is
// timed, so waiting on the loader's workers counts too.

use std::{io::Write, time::Instant};

use anyhow::{Context, Result};
use burn::{prelude::*, tensor::activation::softmax};

use crate::data::batcher::ImageBatch;
use crate::domain::evaluation::EvaluationResult;
use crate::ml::model::ImageClassifier;

/// Evaluate `model` on `batches`, printing the validation block to
/// stdout and, when given, to `log`.
///
/// An empty sequence is an `EvaluationError::EmptyValidationSet`.
pub fn validate<B, M, I>(model: &M, batches: I, log: Option<&mut dyn Write>) -> Result<EvaluationResult>
where
    B: Backend,
    M: ImageClassifier<B>,
    I: IntoIterator<Item = ImageBatch<B>>,
{
    let mut correct = 0usize;
    let mut total   = 0usize;

    let started = Instant::now();
    for batch in batches {
        let probs = softmax(model.logits(batch.images), 1);
        // argmax(1) gives [batch, 1]; flatten to compare with [batch] labels
        let predicted = probs.argmax(1).flatten::<1>(0, 1);
        total += batch.labels.dims()[0];

        // into_scalar reads the count back, which also waits for the backend
        let hits: i64 = predicted
            .equal(batch.labels)
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>();
        correct += hits as usize;
    }
    let elapsed = started.elapsed();

    let result = EvaluationResult::from_counts(correct, total, elapsed)?;
    tracing::debug!("Validation: {}/{} correct", correct, total);

    result.write_report(&mut std::io::stdout())?;
    if let Some(sink) = log {
        result
            .write_report(sink)
            .context("Failed to write validation result to the run log")?;
    }
    Ok(result)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::EvaluationError;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    /// Always predicts class 0.
    struct ConstantClassifier;

    impl ImageClassifier<TestBackend> for ConstantClassifier {
        fn logits(&self, images: Tensor<TestBackend, 4>) -> Tensor<TestBackend, 2> {
            let n = images.dims()[0];
            let row = [3.0f32, 1.0, 0.0];
            let data: Vec<f32> = (0..n).flat_map(|_| row).collect();
            Tensor::from_data(TensorData::new(data, [n, 3]), &images.device())
        }

        fn num_parameters(&self) -> usize { 0 }

        fn flops(&self) -> u64 { 0 }
    }

    fn batch(labels: &[i64]) -> ImageBatch<TestBackend> {
        let device = Default::default();
        let n = labels.len();
        ImageBatch {
            images: Tensor::zeros([n, 3, 32, 32], &device),
            labels: Tensor::from_data(TensorData::new(labels.to_vec(), [n]), &device),
        }
    }

    #[test]
    fn test_two_of_five_is_forty_percent() {
        let batches = vec![batch(&[0, 1]), batch(&[0, 2]), batch(&[1])];
        let mut log = Vec::<u8>::new();

        let result = validate(&ConstantClassifier, batches, Some(&mut log as &mut dyn Write)).unwrap();
        assert_eq!(result.correct, 2);
        assert_eq!(result.total, 5);
        assert!((result.accuracy - 40.0).abs() < 1e-9);
        assert!(result.elapsed_secs >= 0.0);

        let text = String::from_utf8(log).unwrap();
        assert!(text.contains("Accuracy of the network validation images: 40.000000 %"));
    }

    #[test]
    fn test_time_includes_waiting_for_batches() {
        let slow = [&[0i64, 1][..], &[2][..], &[0][..]].into_iter().map(|labels| {
            std::thread::sleep(std::time::Duration::from_millis(100));
            batch(labels)
        });

        let result = validate(&ConstantClassifier, slow, None).unwrap();
        assert_eq!(result.total, 4);
        assert!(result.elapsed_secs >= 0.3, "elapsed {}", result.elapsed_secs);
    }

    #[test]
    fn test_empty_sequence_is_an_error() {
        let err = validate(&ConstantClassifier, Vec::<ImageBatch<TestBackend>>::new(), None)
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<EvaluationError>(),
            Some(&EvaluationError::EmptyValidationSet)
        );
    }
}
