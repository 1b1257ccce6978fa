//! Batch data structure

use ndarray::Array2;

/// A mini-batch of normalized inputs and class labels
#[derive(Debug, Clone)]
pub struct Batch {
    /// Input features, one row per sample
    pub inputs: Array2<f32>,
    /// Class labels, one per row
    pub labels: Vec<usize>,
}

impl Batch {
    /// Create a new batch
    ///
    /// # Panics
    ///
    /// Panics if the number of input rows differs from the number of
    /// labels.
    pub fn new(inputs: Array2<f32>, labels: Vec<usize>) -> Self {
        assert_eq!(inputs.nrows(), labels.len(), "inputs and labels must pair up");
        Self { inputs, labels }
    }

    /// Number of samples in the batch
    pub fn size(&self) -> usize {
        self.labels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_creation() {
        let batch = Batch::new(Array2::zeros((3, 4)), vec![0, 1, 0]);
        assert_eq!(batch.size(), 3);
    }

    #[test]
    #[should_panic(expected = "pair up")]
    fn test_mismatched_labels_panic() {
        let _ = Batch::new(Array2::zeros((3, 4)), vec![0, 1]);
    }
}
