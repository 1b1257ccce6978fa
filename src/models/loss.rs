//! Classification loss and accuracy helpers

use ndarray::{Array2, Axis};

const PROB_FLOOR: f64 = 1e-12;

/// Row-wise numerically stable softmax
pub fn softmax(logits: &Array2<f32>) -> Array2<f32> {
    let mut out = Array2::zeros(logits.raw_dim());
    for (i, row) in logits.rows().into_iter().enumerate() {
        let max = row.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        let mut sum = 0.0f32;
        for (j, &v) in row.iter().enumerate() {
            let e = (v - max).exp();
            out[[i, j]] = e;
            sum += e;
        }
        for j in 0..row.len() {
            out[[i, j]] /= sum;
        }
    }
    out
}

/// Mean negative log-likelihood of the labeled class
pub fn cross_entropy(probs: &Array2<f32>, labels: &[usize]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let total: f64 = labels
        .iter()
        .enumerate()
        .map(|(i, &label)| -f64::from(probs[[i, label]]).max(PROB_FLOOR).ln())
        .sum();
    total / labels.len() as f64
}

/// Fraction of rows whose argmax matches the label
pub fn accuracy(probs: &Array2<f32>, labels: &[usize]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let correct = labels
        .iter()
        .enumerate()
        .filter(|&(i, &label)| argmax(probs, i) == label)
        .count();
    correct as f64 / labels.len() as f64
}

/// Gradient of the mean cross-entropy w.r.t. the logits: (probs - onehot) / n
pub fn logits_grad(probs: &Array2<f32>, labels: &[usize]) -> Array2<f32> {
    let n = labels.len().max(1) as f32;
    let mut grad = probs / n;
    for (i, &label) in labels.iter().enumerate() {
        grad[[i, label]] -= 1.0 / n;
    }
    grad
}

/// Column sums as a single-row array (bias gradients)
pub fn column_sums(grad: &Array2<f32>) -> Array2<f32> {
    grad.sum_axis(Axis(0)).insert_axis(Axis(0))
}

fn argmax(probs: &Array2<f32>, row: usize) -> usize {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (j, &v) in probs.row(row).iter().enumerate() {
        if v > best_value {
            best_value = v;
            best = j;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let logits = Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, -1.0, 0.0, 1.0]).unwrap();
        let probs = softmax(&logits);
        for row in probs.rows() {
            let sum: f32 = row.iter().sum();
            assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_softmax_is_shift_invariant() {
        let a = Array2::from_shape_vec((1, 3), vec![1.0, 2.0, 3.0]).unwrap();
        let b = Array2::from_shape_vec((1, 3), vec![1001.0, 1002.0, 1003.0]).unwrap();
        let pa = softmax(&a);
        let pb = softmax(&b);
        for j in 0..3 {
            assert_abs_diff_eq!(pa[[0, j]], pb[[0, j]], epsilon = 1e-5);
        }
    }

    #[test]
    fn test_cross_entropy_of_confident_correct_prediction() {
        let probs = Array2::from_shape_vec((1, 2), vec![0.99, 0.01]).unwrap();
        let loss = cross_entropy(&probs, &[0]);
        assert!(loss < 0.02);

        let wrong = cross_entropy(&probs, &[1]);
        assert!(wrong > 4.0);
    }

    #[test]
    fn test_cross_entropy_handles_zero_probability() {
        let probs = Array2::from_shape_vec((1, 2), vec![1.0, 0.0]).unwrap();
        let loss = cross_entropy(&probs, &[1]);
        assert!(loss.is_finite());
    }

    #[test]
    fn test_accuracy() {
        let probs =
            Array2::from_shape_vec((3, 2), vec![0.9, 0.1, 0.2, 0.8, 0.6, 0.4]).unwrap();
        assert_abs_diff_eq!(accuracy(&probs, &[0, 1, 1]), 2.0 / 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(accuracy(&probs, &[0, 1, 0]), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_empty_batch_conventions() {
        let probs = Array2::zeros((0, 2));
        assert_eq!(cross_entropy(&probs, &[]), 0.0);
        assert_eq!(accuracy(&probs, &[]), 0.0);
    }

    #[test]
    fn test_logits_grad_rows_sum_to_zero() {
        let logits = Array2::from_shape_vec((2, 3), vec![1.0, 0.0, -1.0, 0.5, 0.5, 0.5]).unwrap();
        let probs = softmax(&logits);
        let grad = logits_grad(&probs, &[0, 2]);

        for row in grad.rows() {
            let sum: f32 = row.iter().sum();
            assert_abs_diff_eq!(sum, 0.0, epsilon = 1e-6);
        }
        // Labeled entries are pulled negative
        assert!(grad[[0, 0]] < 0.0);
        assert!(grad[[1, 2]] < 0.0);
    }

    #[test]
    fn test_column_sums_shape() {
        let grad = Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let sums = column_sums(&grad);
        assert_eq!(sums.shape(), &[1, 3]);
        assert_abs_diff_eq!(sums[[0, 0]], 5.0);
        assert_abs_diff_eq!(sums[[0, 2]], 9.0);
    }
}
