//! Labeled image dataset loading
//!
//! Datasets are CSV files where each row is `label,p0,p1,...` with pixel
//! values 0-255 laid out row-major as height x width x RGB. The image side
//! length is inferred from the row width, the class count from the largest
//! label. Loading fails on unreadable files, ragged rows, non-square pixel
//! counts, or zero samples.
//!
//! Preprocessing metadata derived from the training split is captured in
//! [`TrainParams`] and persisted alongside model weights, so evaluation and
//! inference reproduce identical normalization.

mod error;

pub use error::{DatasetError, Result};

use crate::train::Batch;
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Number of color channels in loaded images
pub const CHANNELS: usize = 3;

const STD_FLOOR: f32 = 1e-8;

/// Preprocessing metadata computed once from training data
///
/// Persisted next to model weights; evaluation and prediction fail without
/// it, since they could not otherwise reproduce the training-time
/// normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainParams {
    /// Per-channel mean of pixel/255 over the training split
    pub norm_mean: Vec<f32>,
    /// Per-channel std of pixel/255 over the training split
    pub norm_std: Vec<f32>,
    /// Image side length after any downsampling
    pub image_size: usize,
    /// Number of classes
    pub classes: usize,
    /// Total samples in the training dataset (before the held-out split)
    pub samples: usize,
}

/// A sized collection of labeled images held as flattened pixel rows
#[derive(Debug, Clone)]
pub struct ImageDataset {
    /// Raw pixel values 0-255, one row per sample
    images: Array2<f32>,
    labels: Vec<usize>,
    image_size: usize,
    classes: usize,
}

impl ImageDataset {
    /// Load a dataset from a CSV of pixel rows
    ///
    /// Images wider than `max_image_size` are downsampled by pixel
    /// striding; smaller ones are kept as-is.
    pub fn load(path: impl AsRef<Path>, max_image_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)
            .map_err(|e| DatasetError::Read { path: display.clone(), reason: e.to_string() })?;

        let mut labels = Vec::new();
        let mut rows: Vec<Vec<f32>> = Vec::new();
        let mut width = None;

        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|e| DatasetError::Malformed {
                path: display.clone(),
                row,
                reason: e.to_string(),
            })?;
            if record.len() < 2 {
                return Err(DatasetError::Malformed {
                    path: display.clone(),
                    row,
                    reason: format!("expected label and pixels, got {} fields", record.len()),
                });
            }

            let label: usize = record[0].trim().parse().map_err(|_| DatasetError::Malformed {
                path: display.clone(),
                row,
                reason: format!("invalid label '{}'", &record[0]),
            })?;

            let pixels = record.len() - 1;
            match width {
                None => width = Some(pixels),
                Some(w) if w != pixels => {
                    return Err(DatasetError::Malformed {
                        path: display.clone(),
                        row,
                        reason: format!("ragged row: {pixels} pixels, expected {w}"),
                    })
                }
                Some(_) => {}
            }

            let mut values = Vec::with_capacity(pixels);
            for field in record.iter().skip(1) {
                let value: f32 = field.trim().parse().map_err(|_| DatasetError::Malformed {
                    path: display.clone(),
                    row,
                    reason: format!("invalid pixel '{field}'"),
                })?;
                values.push(value);
            }

            labels.push(label);
            rows.push(values);
        }

        if rows.is_empty() {
            return Err(DatasetError::Empty(display));
        }

        let width = width.unwrap_or(0);
        let side = infer_side(width)?;

        let mut images = Array2::zeros((rows.len(), width));
        for (i, row) in rows.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                images[[i, j]] = v;
            }
        }

        let mut dataset = Self::from_parts(images, labels, side)?;
        if side > max_image_size && max_image_size > 0 {
            dataset = dataset.downsampled(max_image_size);
        }
        Ok(dataset)
    }

    /// Build a dataset from in-memory parts (class count inferred)
    pub fn from_parts(images: Array2<f32>, labels: Vec<usize>, image_size: usize) -> Result<Self> {
        if images.nrows() == 0 || labels.is_empty() {
            return Err(DatasetError::Empty("<memory>".to_string()));
        }
        if images.ncols() != image_size * image_size * CHANNELS {
            return Err(DatasetError::NotImage(images.ncols()));
        }
        let classes = labels.iter().max().map_or(0, |m| m + 1);
        Ok(Self { images, labels, image_size, classes })
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Check if the dataset holds no samples
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Image side length
    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// Number of classes (largest label + 1)
    pub fn classes(&self) -> usize {
        self.classes
    }

    /// Flattened feature count per sample
    pub fn features(&self) -> usize {
        self.image_size * self.image_size * CHANNELS
    }

    /// Labels in sample order
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Shuffle samples in place
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);
        self.reorder(&order);
    }

    fn reorder(&mut self, order: &[usize]) {
        let mut images = Array2::zeros(self.images.raw_dim());
        let mut labels = Vec::with_capacity(order.len());
        for (dst, &src) in order.iter().enumerate() {
            images.row_mut(dst).assign(&self.images.row(src));
            labels.push(self.labels[src]);
        }
        self.images = images;
        self.labels = labels;
    }

    /// Split off the first `n` samples as a held-out validation set
    ///
    /// Returns `(train, val)`. The class count of the full dataset is kept
    /// on both halves. `n` is clamped to leave at least one training
    /// sample.
    pub fn split_val(self, n: usize) -> (Self, Self) {
        let n = n.min(self.len().saturating_sub(1));
        let classes = self.classes;
        let image_size = self.image_size;

        let val_images = self.images.slice(ndarray::s![..n, ..]).to_owned();
        let train_images = self.images.slice(ndarray::s![n.., ..]).to_owned();
        let val_labels = self.labels[..n].to_vec();
        let train_labels = self.labels[n..].to_vec();

        (
            Self { images: train_images, labels: train_labels, image_size, classes },
            Self { images: val_images, labels: val_labels, image_size, classes },
        )
    }

    /// Per-channel mean and std of pixel/255 over this dataset
    pub fn normalization_stats(&self) -> (Vec<f32>, Vec<f32>) {
        let mut sum = [0.0f64; CHANNELS];
        let mut sum_sq = [0.0f64; CHANNELS];
        let per_channel = (self.len() * self.image_size * self.image_size) as f64;

        for row in self.images.rows() {
            for (j, &v) in row.iter().enumerate() {
                let scaled = f64::from(v) / 255.0;
                sum[j % CHANNELS] += scaled;
                sum_sq[j % CHANNELS] += scaled * scaled;
            }
        }

        let mut mean = Vec::with_capacity(CHANNELS);
        let mut std = Vec::with_capacity(CHANNELS);
        for c in 0..CHANNELS {
            let m = sum[c] / per_channel;
            let var = (sum_sq[c] / per_channel - m * m).max(0.0);
            mean.push(m as f32);
            std.push(var.sqrt() as f32);
        }
        (mean, std)
    }

    /// Batches in sample order, normalized with the given stats
    pub fn batches(&self, batch_size: usize, norm: &TrainParams) -> Vec<Batch> {
        assert!(batch_size > 0, "batch_size must be positive");
        let order: Vec<usize> = (0..self.len()).collect();
        self.batches_in_order(&order, batch_size, norm)
    }

    /// Batches over a fresh shuffle of the samples
    pub fn shuffled_batches<R: Rng>(
        &self,
        batch_size: usize,
        norm: &TrainParams,
        rng: &mut R,
    ) -> Vec<Batch> {
        assert!(batch_size > 0, "batch_size must be positive");
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);
        self.batches_in_order(&order, batch_size, norm)
    }

    fn batches_in_order(&self, order: &[usize], batch_size: usize, norm: &TrainParams) -> Vec<Batch> {
        order
            .chunks(batch_size)
            .map(|chunk| {
                let mut inputs = Array2::zeros((chunk.len(), self.features()));
                let mut labels = Vec::with_capacity(chunk.len());
                for (dst, &src) in chunk.iter().enumerate() {
                    for (j, &v) in self.images.row(src).iter().enumerate() {
                        inputs[[dst, j]] = normalize_pixel(v, j, norm);
                    }
                    labels.push(self.labels[src]);
                }
                Batch::new(inputs, labels)
            })
            .collect()
    }

    /// Downsample every image to `new_side` by pixel striding
    fn downsampled(&self, new_side: usize) -> Self {
        let side = self.image_size;
        let mut images = Array2::zeros((self.len(), new_side * new_side * CHANNELS));
        for i in 0..self.len() {
            for r in 0..new_side {
                let src_r = r * side / new_side;
                for c in 0..new_side {
                    let src_c = c * side / new_side;
                    for ch in 0..CHANNELS {
                        let src = (src_r * side + src_c) * CHANNELS + ch;
                        let dst = (r * new_side + c) * CHANNELS + ch;
                        images[[i, dst]] = self.images[[i, src]];
                    }
                }
            }
        }
        Self {
            images,
            labels: self.labels.clone(),
            image_size: new_side,
            classes: self.classes,
        }
    }
}

/// Normalize raw pixel rows (e.g. prediction queries) with training stats
pub fn normalize_rows(rows: &Array2<f32>, norm: &TrainParams) -> Array2<f32> {
    let mut out = Array2::zeros(rows.raw_dim());
    for i in 0..rows.nrows() {
        for (j, &v) in rows.row(i).iter().enumerate() {
            out[[i, j]] = normalize_pixel(v, j, norm);
        }
    }
    out
}

/// Load prediction queries: CSV rows of raw pixels, no label column
pub fn load_queries(path: impl AsRef<Path>) -> Result<Vec<Vec<f32>>> {
    let path = path.as_ref();
    let display = path.display().to_string();

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| DatasetError::Read { path: display.clone(), reason: e.to_string() })?;

    let mut queries = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| DatasetError::Malformed {
            path: display.clone(),
            row,
            reason: e.to_string(),
        })?;
        let mut values = Vec::with_capacity(record.len());
        for field in record.iter() {
            let value: f32 = field.trim().parse().map_err(|_| DatasetError::Malformed {
                path: display.clone(),
                row,
                reason: format!("invalid pixel '{field}'"),
            })?;
            values.push(value);
        }
        queries.push(values);
    }

    if queries.is_empty() {
        return Err(DatasetError::Empty(display));
    }
    Ok(queries)
}

fn normalize_pixel(value: f32, index: usize, norm: &TrainParams) -> f32 {
    let c = index % CHANNELS;
    let std = norm.norm_std.get(c).copied().unwrap_or(1.0).max(STD_FLOOR);
    let mean = norm.norm_mean.get(c).copied().unwrap_or(0.0);
    (value / 255.0 - mean) / std
}

fn infer_side(width: usize) -> Result<usize> {
    if width == 0 || width % CHANNELS != 0 {
        return Err(DatasetError::NotImage(width));
    }
    let pixels = width / CHANNELS;
    let side = (pixels as f64).sqrt().round() as usize;
    if side * side != pixels {
        return Err(DatasetError::NotImage(width));
    }
    Ok(side)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write;

    fn write_csv(rows: &[String]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn pixel_row(label: usize, value: f32, side: usize) -> String {
        let pixels = vec![format!("{value}"); side * side * CHANNELS];
        format!("{label},{}", pixels.join(","))
    }

    #[test]
    fn test_load_infers_metadata() {
        let file = write_csv(&[
            pixel_row(0, 10.0, 2),
            pixel_row(1, 200.0, 2),
            pixel_row(1, 190.0, 2),
        ]);
        let ds = ImageDataset::load(file.path(), 32).unwrap();

        assert_eq!(ds.len(), 3);
        assert_eq!(ds.image_size(), 2);
        assert_eq!(ds.classes(), 2);
        assert_eq!(ds.features(), 12);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = ImageDataset::load("/nonexistent/train.csv", 32).unwrap_err();
        assert!(matches!(err, DatasetError::Read { .. }));
    }

    #[test]
    fn test_load_empty_file_fails() {
        let file = write_csv(&[]);
        let err = ImageDataset::load(file.path(), 32).unwrap_err();
        assert!(matches!(err, DatasetError::Empty(_)));
    }

    #[test]
    fn test_load_ragged_rows_fail() {
        let file = write_csv(&[pixel_row(0, 10.0, 2), pixel_row(0, 10.0, 4)]);
        let err = ImageDataset::load(file.path(), 32).unwrap_err();
        assert!(matches!(err, DatasetError::Malformed { .. }));
    }

    #[test]
    fn test_load_non_square_width_fails() {
        let file = write_csv(&["0,1,2,3,4,5,6".to_string()]);
        let err = ImageDataset::load(file.path(), 32).unwrap_err();
        assert!(matches!(err, DatasetError::NotImage(6)));
    }

    #[test]
    fn test_load_bad_label_fails() {
        let pixels = vec!["10"; 12].join(",");
        let file = write_csv(&[format!("cat,{pixels}")]);
        let err = ImageDataset::load(file.path(), 32).unwrap_err();
        assert!(matches!(err, DatasetError::Malformed { .. }));
    }

    #[test]
    fn test_downsampling_to_max_size() {
        let file = write_csv(&[pixel_row(0, 10.0, 4)]);
        let ds = ImageDataset::load(file.path(), 2).unwrap();
        assert_eq!(ds.image_size(), 2);
        assert_eq!(ds.features(), 12);
    }

    #[test]
    fn test_split_val_takes_prefix() {
        let images = Array2::from_shape_fn((5, 3), |(i, _)| i as f32);
        let ds = ImageDataset::from_parts(images, vec![0, 1, 0, 1, 0], 1).unwrap();
        let (train, val) = ds.split_val(2);

        assert_eq!(val.len(), 2);
        assert_eq!(train.len(), 3);
        assert_eq!(val.labels(), &[0, 1]);
        assert_eq!(train.labels(), &[0, 1, 0]);
        // Class count survives the split even if a half loses a class
        assert_eq!(val.classes(), 2);
        assert_eq!(train.classes(), 2);
    }

    #[test]
    fn test_split_val_leaves_a_training_sample() {
        let images = Array2::zeros((2, 3));
        let ds = ImageDataset::from_parts(images, vec![0, 1], 1).unwrap();
        let (train, val) = ds.split_val(10);
        assert_eq!(train.len(), 1);
        assert_eq!(val.len(), 1);
    }

    #[test]
    fn test_normalization_stats() {
        // One 1x1 RGB image per row: channels are the columns
        let images = Array2::from_shape_vec((2, 3), vec![0.0, 255.0, 51.0, 255.0, 255.0, 51.0])
            .unwrap();
        let ds = ImageDataset::from_parts(images, vec![0, 1], 1).unwrap();
        let (mean, std) = ds.normalization_stats();

        assert_abs_diff_eq!(mean[0], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(mean[1], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(mean[2], 0.2, epsilon = 1e-6);
        assert_abs_diff_eq!(std[0], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(std[1], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_batches_shapes_and_normalization() {
        let images = Array2::from_elem((5, 3), 255.0);
        let ds = ImageDataset::from_parts(images, vec![0, 1, 0, 1, 0], 1).unwrap();
        let norm = TrainParams {
            norm_mean: vec![0.5; 3],
            norm_std: vec![0.5; 3],
            image_size: 1,
            classes: 2,
            samples: 5,
        };

        let batches = ds.batches(2, &norm);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].size(), 2);
        assert_eq!(batches[2].size(), 1);
        // (255/255 - 0.5) / 0.5 = 1.0
        assert_abs_diff_eq!(batches[0].inputs[[0, 0]], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_shuffled_batches_preserve_pairing() {
        // Distinct per-sample pixel values so the image identifies its label
        let images = Array2::from_shape_fn((8, 3), |(i, _)| (i * 10) as f32);
        let labels: Vec<usize> = (0..8).map(|i| i % 2).collect();
        let ds = ImageDataset::from_parts(images, labels, 1).unwrap();
        let norm = TrainParams {
            norm_mean: vec![0.0; 3],
            norm_std: vec![1.0; 3],
            image_size: 1,
            classes: 2,
            samples: 8,
        };

        let mut rng = StdRng::seed_from_u64(7);
        let batches = ds.shuffled_batches(3, &norm, &mut rng);
        let total: usize = batches.iter().map(Batch::size).sum();
        assert_eq!(total, 8);

        for batch in &batches {
            for (row, &label) in batch.inputs.rows().into_iter().zip(&batch.labels) {
                let sample = (row[0] * 255.0 / 10.0).round() as usize;
                assert_eq!(sample % 2, label);
            }
        }
    }

    #[test]
    fn test_shuffle_keeps_label_pairing() {
        let images = Array2::from_shape_fn((6, 3), |(i, _)| i as f32);
        let labels: Vec<usize> = (0..6).map(|i| i % 3).collect();
        let mut ds = ImageDataset::from_parts(images, labels, 1).unwrap();

        let mut rng = StdRng::seed_from_u64(3);
        ds.shuffle(&mut rng);

        for i in 0..ds.len() {
            let sample = ds.images[[i, 0]] as usize;
            assert_eq!(sample % 3, ds.labels()[i]);
        }
    }

    #[test]
    fn test_load_queries() {
        let file = write_csv(&["1,2,3".to_string(), "4,5,6".to_string()]);
        let queries = load_queries(file.path()).unwrap();
        assert_eq!(queries, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
    }

    #[test]
    fn test_train_params_serde() {
        let tp = TrainParams {
            norm_mean: vec![0.1, 0.2, 0.3],
            norm_std: vec![0.4, 0.5, 0.6],
            image_size: 32,
            classes: 10,
            samples: 1024,
        };
        let json = serde_json::to_string(&tp).unwrap();
        let parsed: TrainParams = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, tp);
    }
}
