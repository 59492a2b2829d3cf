// ============================================================
// Layer 3 — Evaluation Result
// ============================================================
// Plain numbers produced by one pass of the evaluation loop
// (ml/evaluator.rs). Kept framework-free so the accuracy
// arithmetic and the report format are testable without a
// tensor backend.

use std::io::{self, Write};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::EvaluationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Top-1 accuracy in percent, 0..=100
    pub accuracy: f64,
    /// Wall-clock seconds spent in the loop
    pub elapsed_secs: f64,
    pub correct: usize,
    pub total: usize,
}

impl EvaluationResult {
    /// `total == 0` is a configuration error, never a 0% or NaN accuracy.
    pub fn from_counts(
        correct: usize,
        total:   usize,
        elapsed: Duration,
    ) -> Result<Self, EvaluationError> {
        if total == 0 {
            return Err(EvaluationError::EmptyValidationSet);
        }
        Ok(Self {
            accuracy: 100.0 * correct as f64 / total as f64,
            elapsed_secs: elapsed.as_secs_f64(),
            correct,
            total,
        })
    }

    /// Fixed human-readable block, shared by stdout and the run log.
    pub fn write_report<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "*************** Validation ***************")?;
        writeln!(out, "Accuracy of the network validation images: {:.6} %", self.accuracy)?;
        writeln!(out, "Validation time is: {:.6}s", self.elapsed_secs)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_of_five_is_forty_percent() {
        let r = EvaluationResult::from_counts(2, 5, Duration::from_millis(1500)).unwrap();
        assert_eq!(r.accuracy, 40.0);
        assert_eq!(r.elapsed_secs, 1.5);
    }

    #[test]
    fn test_empty_is_an_error() {
        let err = EvaluationResult::from_counts(0, 0, Duration::ZERO).unwrap_err();
        assert_eq!(err, EvaluationError::EmptyValidationSet);
    }

    #[test]
    fn test_report_format() {
        let r = EvaluationResult::from_counts(1, 4, Duration::from_millis(250)).unwrap();
        let mut buf = Vec::new();
        r.write_report(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "*************** Validation ***************");
        assert_eq!(lines[1], "Accuracy of the network validation images: 25.000000 %");
        assert_eq!(lines[2], "Validation time is: 0.250000s");
    }
}
