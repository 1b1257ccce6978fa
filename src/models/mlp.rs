//! One-hidden-layer MLP image classifier

use crate::dataset::{self, ImageDataset, TrainParams};
use crate::knob::{Knob, KnobConfig, KnobSet, KnobValue};
use crate::logger::Logger;
use crate::model::{Network, Param, StepStats, TunableModel};
use crate::models::loss;
use crate::optim::{Adam, ConstantLr};
use crate::params::{self, ParamMap, ParamsError};
use crate::train::{Batch, FitSettings, Trainer};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

/// Epochs of patience on the held-out loss before stopping
const EARLY_STOP_PATIENCE: i32 = 2;
/// Fraction of training samples held out for validation (1/20)
const VAL_DIVISOR: usize = 20;

/// ReLU MLP with one hidden layer
///
/// Backprop is written out by hand; two matmuls each way.
pub struct MlpNet {
    w1: Param,
    b1: Param,
    w2: Param,
    b2: Param,
}

impl MlpNet {
    /// Uniform Glorot-style initialization of both layers
    pub fn new(features: usize, hidden: usize, classes: usize, rng: &mut StdRng) -> Self {
        Self {
            w1: Param::new("w1", glorot(features, hidden, rng)),
            b1: Param::zeros("b1", 1, hidden),
            w2: Param::new("w2", glorot(hidden, classes, rng)),
            b2: Param::zeros("b2", 1, classes),
        }
    }

    /// Hidden width
    pub fn hidden(&self) -> usize {
        self.b1.value.ncols()
    }

    fn forward(&self, inputs: &Array2<f32>) -> (Array2<f32>, Array2<f32>) {
        let pre = inputs.dot(&self.w1.value) + &self.b1.value;
        let hidden = pre.mapv(|v| v.max(0.0));
        let logits = hidden.dot(&self.w2.value) + &self.b2.value;
        (pre, logits)
    }
}

fn glorot(rows: usize, cols: usize, rng: &mut StdRng) -> Array2<f32> {
    let scale = (6.0 / (rows + cols) as f64).sqrt() as f32;
    Array2::from_shape_fn((rows, cols), |_| (rng.random::<f32>() * 2.0 - 1.0) * scale)
}

impl Network for MlpNet {
    fn train_batch(&mut self, batch: &Batch) -> StepStats {
        let (pre, logits) = self.forward(&batch.inputs);
        let hidden = pre.mapv(|v| v.max(0.0));
        let probs = loss::softmax(&logits);
        let stats = StepStats {
            loss: loss::cross_entropy(&probs, &batch.labels),
            accuracy: loss::accuracy(&probs, &batch.labels),
        };

        let dlogits = loss::logits_grad(&probs, &batch.labels);
        self.w2.grad = hidden.t().dot(&dlogits);
        self.b2.grad = loss::column_sums(&dlogits);

        let dhidden = dlogits.dot(&self.w2.value.t());
        let dpre = &dhidden * &pre.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
        self.w1.grad = batch.inputs.t().dot(&dpre);
        self.b1.grad = loss::column_sums(&dpre);

        stats
    }

    fn eval_batch(&self, batch: &Batch) -> StepStats {
        let (_, logits) = self.forward(&batch.inputs);
        let probs = loss::softmax(&logits);
        StepStats {
            loss: loss::cross_entropy(&probs, &batch.labels),
            accuracy: loss::accuracy(&probs, &batch.labels),
        }
    }

    fn predict_probs(&self, inputs: &Array2<f32>) -> Array2<f32> {
        let (_, logits) = self.forward(inputs);
        loss::softmax(&logits)
    }

    fn params(&self) -> Vec<&Param> {
        vec![&self.w1, &self.b1, &self.w2, &self.b2]
    }

    fn params_mut(&mut self) -> Vec<&mut Param> {
        vec![&mut self.w1, &mut self.b1, &mut self.w2, &mut self.b2]
    }
}

/// One-hidden-layer MLP classifier trained with Adam
///
/// Holds out 5% of training data, stops after two epochs without
/// improvement, and does not share parameters across trials.
pub struct MlpImage {
    knobs: KnobSet,
    logger: Logger,
    net: Option<MlpNet>,
    train_params: Option<TrainParams>,
}

impl MlpImage {
    fn net(&self) -> crate::Result<&MlpNet> {
        self.net
            .as_ref()
            .ok_or_else(|| crate::Error::Config("model has not been trained or loaded".to_string()))
    }

    fn train_params(&self) -> crate::Result<&TrainParams> {
        self.train_params
            .as_ref()
            .ok_or_else(|| crate::Error::Params(ParamsError::MissingTrainParams))
    }
}

impl TunableModel for MlpImage {
    fn knob_config() -> KnobConfig {
        let mut config = KnobConfig::new();
        config.insert("max_epochs", Knob::Fixed(KnobValue::Int(10)));
        config.insert("learning_rate", Knob::Float { low: 1e-5, high: 1e-2, log_scale: true });
        config.insert(
            "batch_size",
            Knob::Categorical(vec![
                KnobValue::Int(16),
                KnobValue::Int(32),
                KnobValue::Int(64),
                KnobValue::Int(128),
            ]),
        );
        config.insert(
            "max_image_size",
            Knob::Categorical(vec![
                KnobValue::Int(32),
                KnobValue::Int(64),
                KnobValue::Int(128),
                KnobValue::Int(224),
            ]),
        );
        config.insert(
            "hidden_units",
            Knob::Categorical(vec![KnobValue::Int(64), KnobValue::Int(128), KnobValue::Int(256)]),
        );
        config.insert("seed", Knob::Fixed(KnobValue::Int(42)));
        config
    }

    fn build(knobs: KnobSet, logger: Logger) -> crate::Result<Self> {
        Ok(Self { knobs, logger, net: None, train_params: None })
    }

    fn train(&mut self, dataset_uri: &str, shared: &ParamMap) -> crate::Result<()> {
        let max_image_size = self.knobs.usize("max_image_size")?;
        let max_epochs = self.knobs.usize("max_epochs")?;
        let batch_size = self.knobs.usize("batch_size")?;
        let hidden = self.knobs.usize("hidden_units")?;
        let lr = self.knobs.f64("learning_rate")? as f32;
        let seed = self.knobs.i64("seed")? as u64;

        self.logger.log("Loading train dataset...");
        let mut ds = ImageDataset::load(dataset_uri, max_image_size)?;
        let samples = ds.len();
        let mut rng = StdRng::seed_from_u64(seed);
        ds.shuffle(&mut rng);

        let classes = ds.classes();
        let (train_ds, val_ds) = ds.split_val(samples / VAL_DIVISOR);

        let (norm_mean, norm_std) = train_ds.normalization_stats();
        let train_params = TrainParams {
            norm_mean,
            norm_std,
            image_size: train_ds.image_size(),
            classes,
            samples,
        };
        self.logger.log(format!("Train dataset has {} samples", train_ds.len()));

        self.logger.log("Building model...");
        let mut net = MlpNet::new(train_ds.features(), hidden, classes, &mut rng);
        self.logger.log(format!("Model has {} parameters", net.param_count()));

        if !shared.is_empty() {
            self.logger.log("Loading shared parameters...");
            params::apply_params(&mut net.params_mut(), shared);
        }

        let settings = FitSettings::new(max_epochs, batch_size)
            .with_early_stop_patience(EARLY_STOP_PATIENCE)
            .with_seed(seed);
        let mut trainer = Trainer::new(
            Box::new(Adam::default_params(lr)),
            Box::new(ConstantLr::new(lr)),
            settings,
            self.logger.clone(),
        );

        let report = trainer.fit(&mut net, &train_ds, &val_ds, &train_params);
        self.logger.log(format!("Train loss: {}", report.train_loss));
        self.logger.log(format!("Train accuracy: {}", report.train_acc));

        self.net = Some(net);
        self.train_params = Some(train_params);
        Ok(())
    }

    fn evaluate(&mut self, dataset_uri: &str) -> crate::Result<f64> {
        let train_params = self.train_params()?.clone();
        let batch_size = self.knobs.usize("batch_size")?;
        let net = self.net()?;

        self.logger.log("Loading val dataset...");
        let ds = ImageDataset::load(dataset_uri, train_params.image_size)?;

        let mut correct = 0.0;
        let mut total_loss = 0.0;
        for batch in ds.batches(batch_size, &train_params) {
            let stats = net.eval_batch(&batch);
            correct += stats.accuracy * batch.size() as f64;
            total_loss += stats.loss * batch.size() as f64;
        }
        self.logger.log(format!("Validation loss: {}", total_loss / ds.len() as f64));

        Ok(correct / ds.len() as f64)
    }

    fn predict(&self, queries: &[Vec<f32>]) -> crate::Result<Vec<Vec<f32>>> {
        let train_params = self.train_params()?;
        let net = self.net()?;
        let features = train_params.image_size * train_params.image_size * dataset::CHANNELS;

        let mut rows = Array2::zeros((queries.len(), features));
        for (i, query) in queries.iter().enumerate() {
            if query.len() != features {
                return Err(crate::Error::Config(format!(
                    "query {i} has {} values, expected {features}",
                    query.len()
                )));
            }
            for (j, &v) in query.iter().enumerate() {
                rows[[i, j]] = v;
            }
        }

        let probs = net.predict_probs(&dataset::normalize_rows(&rows, train_params));
        Ok(probs.rows().into_iter().map(|row| row.to_vec()).collect())
    }

    fn save_parameters(&self, dir: &Path) -> crate::Result<()> {
        let net = self.net()?;
        let train_params = self.train_params()?;
        let map = params::export_params(&net.params(), 0);
        params::save_dir(dir, &map, train_params)?;
        Ok(())
    }

    fn load_parameters(&mut self, dir: &Path) -> crate::Result<()> {
        let (map, train_params) = params::load_dir(dir)?;
        let hidden = self.knobs.usize("hidden_units")?;
        let seed = self.knobs.i64("seed")? as u64;

        let features = train_params.image_size * train_params.image_size * dataset::CHANNELS;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut net = MlpNet::new(features, hidden, train_params.classes, &mut rng);
        params::apply_params(&mut net.params_mut(), &map);

        self.net = Some(net);
        self.train_params = Some(train_params);
        Ok(())
    }

    fn shared_parameters(&self) -> crate::Result<Option<ParamMap>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::{Optimizer as _, Sgd};
    use approx::assert_abs_diff_eq;

    fn xor_batch() -> Batch {
        // XOR is not linearly separable; one hidden layer cracks it
        let inputs = Array2::from_shape_vec(
            (4, 2),
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0],
        )
        .unwrap();
        Batch::new(inputs, vec![0, 1, 1, 0])
    }

    #[test]
    fn test_mlp_learns_xor() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut net = MlpNet::new(2, 16, 2, &mut rng);
        let mut opt = Adam::default_params(0.05);
        let batch = xor_batch();

        for _ in 0..500 {
            net.train_batch(&batch);
            opt.step(&mut net.params_mut());
        }

        let stats = net.eval_batch(&batch);
        assert_eq!(stats.accuracy, 1.0);
        assert!(stats.loss < 0.2);
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut net = MlpNet::new(2, 4, 2, &mut rng);
        let batch = xor_batch();

        net.train_batch(&batch);
        let analytic = net.w1.grad[[0, 0]];

        let eps = 1e-3;
        let original = net.w1.value[[0, 0]];
        net.w1.value[[0, 0]] = original + eps;
        let plus = net.eval_batch(&batch).loss;
        net.w1.value[[0, 0]] = original - eps;
        let minus = net.eval_batch(&batch).loss;
        net.w1.value[[0, 0]] = original;

        let numeric = ((plus - minus) / (2.0 * f64::from(eps))) as f32;
        assert_abs_diff_eq!(analytic, numeric, epsilon = 1e-2);
    }

    #[test]
    fn test_sgd_also_drives_the_net() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut net = MlpNet::new(2, 8, 2, &mut rng);
        let mut opt = Sgd::new(0.05, 0.9, 0.0, true);
        let batch = xor_batch();

        let first = net.eval_batch(&batch).loss;
        for _ in 0..300 {
            net.train_batch(&batch);
            opt.step(&mut net.params_mut());
        }
        assert!(net.eval_batch(&batch).loss < first);
    }

    #[test]
    fn test_knob_config_shape() {
        let config = MlpImage::knob_config();
        assert!(config.get("learning_rate").is_some());
        assert!(config.get("hidden_units").is_some());

        let baseline = config.baseline();
        assert_eq!(baseline.i64("max_epochs").unwrap(), 10);
        assert_eq!(baseline.i64("hidden_units").unwrap(), 64);
    }

    #[test]
    fn test_no_shared_parameters() {
        let model = MlpImage::build(MlpImage::knob_config().baseline(), Logger::null()).unwrap();
        assert!(model.shared_parameters().unwrap().is_none());
    }

    #[test]
    fn test_hidden_accessor() {
        let mut rng = StdRng::seed_from_u64(9);
        let net = MlpNet::new(4, 32, 3, &mut rng);
        assert_eq!(net.hidden(), 32);
    }
}
