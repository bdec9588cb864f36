use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum StatsError {
    #[error("cannot summarize an empty sample set")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub mean: f64,
    pub std_dev: f64,
    pub samples: usize,
}

/// Mean and sample (n - 1) standard deviation of `samples`.
///
/// A single sample has a standard deviation of zero.
pub fn mean_std_dev(samples: &[f64]) -> Result<Summary, StatsError> {
    if samples.is_empty() {
        return Err(StatsError::Empty);
    }

    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;

    let std_dev = if samples.len() == 1 {
        0.0
    } else {
        let sum_sq: f64 = samples.iter().map(|x| (x - mean).powi(2)).sum();
        (sum_sq / (n - 1.0)).sqrt()
    };

    Ok(Summary {
        mean,
        std_dev,
        samples: samples.len(),
    })
}
