//! Linear softmax image classifier

use crate::dataset::{self, ImageDataset, TrainParams};
use crate::knob::{Knob, KnobConfig, KnobSet, KnobValue};
use crate::logger::Logger;
use crate::model::{Network, Param, StepStats, TrialPlan, TunableModel};
use crate::models::loss;
use crate::optim::{MultiStepLr, Sgd};
use crate::params::{self, ParamMap, ParamsError};
use crate::train::{Batch, FitSettings, Trainer};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;

/// Linear softmax network: one weight matrix and a bias row
///
/// Gradients are closed-form; the cross-entropy/softmax pair makes the
/// logit gradient `(probs - onehot) / batch`.
pub struct SoftmaxNet {
    weight: Param,
    bias: Param,
}

impl SoftmaxNet {
    /// Zero-initialized network (the objective is convex)
    pub fn new(features: usize, classes: usize) -> Self {
        Self {
            weight: Param::zeros("weight", features, classes),
            bias: Param::zeros("bias", 1, classes),
        }
    }

    fn forward(&self, inputs: &Array2<f32>) -> Array2<f32> {
        inputs.dot(&self.weight.value) + &self.bias.value
    }
}

impl Network for SoftmaxNet {
    fn train_batch(&mut self, batch: &Batch) -> StepStats {
        let probs = loss::softmax(&self.forward(&batch.inputs));
        let stats = StepStats {
            loss: loss::cross_entropy(&probs, &batch.labels),
            accuracy: loss::accuracy(&probs, &batch.labels),
        };

        let dlogits = loss::logits_grad(&probs, &batch.labels);
        self.weight.grad = batch.inputs.t().dot(&dlogits);
        self.bias.grad = loss::column_sums(&dlogits);

        stats
    }

    fn eval_batch(&self, batch: &Batch) -> StepStats {
        let probs = loss::softmax(&self.forward(&batch.inputs));
        StepStats {
            loss: loss::cross_entropy(&probs, &batch.labels),
            accuracy: loss::accuracy(&probs, &batch.labels),
        }
    }

    fn predict_probs(&self, inputs: &Array2<f32>) -> Array2<f32> {
        loss::softmax(&self.forward(inputs))
    }

    fn params(&self) -> Vec<&Param> {
        vec![&self.weight, &self.bias]
    }

    fn params_mut(&mut self) -> Vec<&mut Param> {
        vec![&mut self.weight, &mut self.bias]
    }
}

/// Linear softmax classifier over flattened normalized pixels
///
/// Trains with Nesterov SGD under a milestone LR schedule and shares its
/// parameters across tuning trials (`if_share_params`).
pub struct SoftmaxImage {
    knobs: KnobSet,
    logger: Logger,
    net: Option<SoftmaxNet>,
    train_params: Option<TrainParams>,
    step: u64,
}

impl SoftmaxImage {
    fn net(&self) -> crate::Result<&SoftmaxNet> {
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

impl TunableModel for SoftmaxImage {
    fn knob_config() -> KnobConfig {
        let mut config = KnobConfig::new();
        config.insert("max_trial_epochs", Knob::Fixed(KnobValue::Int(200)));
        config.insert("lr", Knob::Float { low: 1e-4, high: 1.0, log_scale: true });
        config.insert("lr_decay", Knob::Float { low: 1e-3, high: 1e-1, log_scale: true });
        config.insert("opt_momentum", Knob::Float { low: 0.7, high: 1.0, log_scale: true });
        config.insert("opt_weight_decay", Knob::Float { low: 1e-5, high: 1e-3, log_scale: true });
        config.insert(
            "batch_size",
            Knob::Categorical(vec![KnobValue::Int(32), KnobValue::Int(64), KnobValue::Int(128)]),
        );
        config.insert("max_image_size", Knob::Fixed(KnobValue::Int(32)));
        config.insert("max_train_val_samples", Knob::Fixed(KnobValue::Int(1024)));
        config.insert("early_stop_patience_epochs", Knob::Fixed(KnobValue::Int(5)));
        config.insert("if_share_params", Knob::Fixed(KnobValue::Bool(true)));
        config.insert("seed", Knob::Fixed(KnobValue::Int(42)));
        config
    }

    fn build(knobs: KnobSet, logger: Logger) -> crate::Result<Self> {
        Ok(Self { knobs, logger, net: None, train_params: None, step: 0 })
    }

    fn trial_plan(trial_no: usize, total_trials: usize) -> TrialPlan {
        let plan = TrialPlan::default_for(trial_no, total_trials);
        if plan.should_save {
            // Final trials: train longer, from scratch, without a held-out split
            plan.with_override("max_trial_epochs", KnobValue::Int(300))
                .with_override("max_train_val_samples", KnobValue::Int(0))
        } else {
            plan
        }
    }

    fn train(&mut self, dataset_uri: &str, shared: &ParamMap) -> crate::Result<()> {
        let max_image_size = self.knobs.usize("max_image_size")?;
        let max_train_val_samples = self.knobs.usize("max_train_val_samples")?;
        let trial_epochs = self.knobs.usize("max_trial_epochs")?;
        let batch_size = self.knobs.usize("batch_size")?;
        let patience = self.knobs.i64("early_stop_patience_epochs")? as i32;
        let lr = self.knobs.f64("lr")? as f32;
        let lr_decay = self.knobs.f64("lr_decay")? as f32;
        let momentum = self.knobs.f64("opt_momentum")? as f32;
        let weight_decay = self.knobs.f64("opt_weight_decay")? as f32;
        let seed = self.knobs.i64("seed")? as u64;

        self.logger.log("Loading train dataset...");
        let mut ds = ImageDataset::load(dataset_uri, max_image_size)?;
        let samples = ds.len();
        let mut rng = StdRng::seed_from_u64(seed);
        ds.shuffle(&mut rng);

        // Up to a fifth of samples are held out for validation
        let n_val = (samples / 5).min(max_train_val_samples);
        let classes = ds.classes();
        let (train_ds, val_ds) = ds.split_val(n_val);

        let (norm_mean, norm_std) = train_ds.normalization_stats();
        let train_params = TrainParams {
            norm_mean,
            norm_std,
            image_size: train_ds.image_size(),
            classes,
            samples,
        };
        self.logger.log(format!("Train dataset has {} samples", train_ds.len()));
        self.logger.log(format!("Train-val dataset has {} samples", val_ds.len()));

        self.logger.log("Building model...");
        let mut net = SoftmaxNet::new(train_ds.features(), classes);
        self.logger.log(format!("Model has {} parameters", net.param_count()));

        let mut step = 0;
        if !shared.is_empty() {
            self.logger.log("Loading shared parameters...");
            step = params::apply_params(&mut net.params_mut(), shared);
        }

        let settings = FitSettings::new(trial_epochs, batch_size)
            .with_early_stop_patience(patience)
            .with_seed(seed);
        let mut trainer = Trainer::new(
            Box::new(Sgd::new(lr, momentum, weight_decay, true)),
            Box::new(MultiStepLr::for_trial(lr, lr_decay, trial_epochs)),
            settings,
            self.logger.clone(),
        )
        .with_step(step);

        trainer.fit(&mut net, &train_ds, &val_ds, &train_params);

        self.step = trainer.global_step();
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
        for batch in ds.batches(batch_size, &train_params) {
            let stats = net.eval_batch(&batch);
            correct += stats.accuracy * batch.size() as f64;
        }
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
        let map = params::export_params(&net.params(), self.step);
        params::save_dir(dir, &map, train_params)?;
        Ok(())
    }

    fn load_parameters(&mut self, dir: &Path) -> crate::Result<()> {
        let (map, train_params) = params::load_dir(dir)?;

        let features = train_params.image_size * train_params.image_size * dataset::CHANNELS;
        let mut net = SoftmaxNet::new(features, train_params.classes);
        self.step = params::apply_params(&mut net.params_mut(), &map);

        self.net = Some(net);
        self.train_params = Some(train_params);
        Ok(())
    }

    fn shared_parameters(&self) -> crate::Result<Option<ParamMap>> {
        if !self.knobs.bool("if_share_params")? {
            return Ok(None);
        }
        let net = self.net()?;
        Ok(Some(params::export_params(&net.params(), self.step)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SharedParamsPolicy;
    use crate::optim::Optimizer as _;

    fn separable_batch() -> Batch {
        // Two obviously separable points per class
        let inputs = Array2::from_shape_vec(
            (4, 3),
            vec![1.0, 0.0, 0.0, 1.0, 0.1, 0.0, 0.0, 0.0, 1.0, 0.0, 0.1, 1.0],
        )
        .unwrap();
        Batch::new(inputs, vec![0, 0, 1, 1])
    }

    #[test]
    fn test_training_reduces_loss() {
        let mut net = SoftmaxNet::new(3, 2);
        let mut opt = Sgd::plain(0.5);
        let batch = separable_batch();

        let first = net.train_batch(&batch);
        opt.step(&mut net.params_mut());
        for _ in 0..50 {
            net.train_batch(&batch);
            opt.step(&mut net.params_mut());
        }
        let last = net.eval_batch(&batch);

        assert!(last.loss < first.loss);
        assert_eq!(last.accuracy, 1.0);
    }

    #[test]
    fn test_eval_batch_does_not_touch_params() {
        let net = SoftmaxNet::new(3, 2);
        let before: Vec<f32> = net.weight.value.iter().copied().collect();
        net.eval_batch(&separable_batch());
        let after: Vec<f32> = net.weight.value.iter().copied().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_zero_init_predicts_uniform() {
        let net = SoftmaxNet::new(3, 4);
        let probs = net.predict_probs(&Array2::zeros((1, 3)));
        for j in 0..4 {
            assert!((probs[[0, j]] - 0.25).abs() < 1e-6);
        }
    }

    #[test]
    fn test_knob_config_shape() {
        let config = SoftmaxImage::knob_config();
        assert!(config.get("lr").is_some());
        assert!(config.get("batch_size").is_some());
        assert!(config.get("if_share_params").is_some());

        let baseline = config.baseline();
        assert_eq!(baseline.i64("max_trial_epochs").unwrap(), 200);
        assert_eq!(baseline.i64("batch_size").unwrap(), 32);
    }

    #[test]
    fn test_trial_plan_final_overrides() {
        let plan = SoftmaxImage::trial_plan(95, 100);
        assert_eq!(plan.shared_params, SharedParamsPolicy::None);
        assert_eq!(plan.override_knobs.get("max_trial_epochs"), Some(&KnobValue::Int(300)));
        assert_eq!(plan.override_knobs.get("max_train_val_samples"), Some(&KnobValue::Int(0)));

        let plan = SoftmaxImage::trial_plan(0, 100);
        assert_eq!(plan.shared_params, SharedParamsPolicy::LocalBest);
        assert!(plan.override_knobs.is_empty());
    }

    #[test]
    fn test_untrained_model_errors() {
        let model =
            SoftmaxImage::build(SoftmaxImage::knob_config().baseline(), Logger::null()).unwrap();
        assert!(model.predict(&[vec![0.0; 12]]).is_err());
        assert!(model.save_parameters(Path::new("/tmp/unused")).is_err());
    }
}
