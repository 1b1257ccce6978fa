//! Parameter serialization
//!
//! Model weights travel as a [`ParamMap`]: a flat name-to-tensor mapping
//! with the network parameters under a `net:` prefix and the global step
//! counter merged in as its own entry. The same map backs three surfaces:
//!
//! - **directory form** - `model.json` + `train_params.json`, written by
//!   `save_parameters` and read back by `load_parameters`;
//! - **blob form** - a single JSON document with the weights payload
//!   base64-encoded, for platforms that store parameters in-memory;
//! - **shared form** - the raw map handed between trials to seed weights.
//!
//! Importing is best-effort by name: missing, extra, or shape-mismatched
//! keys are skipped rather than failing the trial. Missing or corrupt
//! *files* are fatal.

mod error;

pub use error::{ParamsError, Result};

use crate::dataset::TrainParams;
use crate::model::Param;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Weights file inside a parameters directory
pub const MODEL_FILE: &str = "model.json";
/// Preprocessing metadata file inside a parameters directory
pub const TRAIN_PARAMS_FILE: &str = "train_params.json";

const NET_PREFIX: &str = "net:";
const STEP_KEY: &str = "step";

/// A flat tensor: shape plus row-major data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorData {
    /// Tensor shape
    pub shape: Vec<usize>,
    /// Row-major values
    pub data: Vec<f32>,
}

impl TensorData {
    /// Flatten a 2-D array
    pub fn from_array2(array: &Array2<f32>) -> Self {
        Self { shape: array.shape().to_vec(), data: array.iter().copied().collect() }
    }

    /// Rebuild a 2-D array; None if the shape does not describe one
    pub fn to_array2(&self) -> Option<Array2<f32>> {
        if self.shape.len() != 2 {
            return None;
        }
        Array2::from_shape_vec((self.shape[0], self.shape[1]), self.data.clone()).ok()
    }
}

/// Flat name-to-tensor mapping (the opaque weights blob)
pub type ParamMap = BTreeMap<String, TensorData>;

/// Export parameters under the `net:` prefix, merging the step counter
pub fn export_params(params: &[&Param], step: u64) -> ParamMap {
    let mut map = ParamMap::new();
    for param in params {
        map.insert(format!("{NET_PREFIX}{}", param.name), TensorData::from_array2(&param.value));
    }
    map.insert(STEP_KEY.to_string(), TensorData { shape: vec![1], data: vec![step as f32] });
    map
}

/// Best-effort import: copy matching tensors by name, return the step
///
/// Keys that are absent from the map, keys the model does not declare, and
/// tensors whose shape disagrees are all skipped. Returns the recovered
/// step counter (0 when the entry is absent).
pub fn apply_params(params: &mut [&mut Param], map: &ParamMap) -> u64 {
    for param in params.iter_mut() {
        let key = format!("{NET_PREFIX}{}", param.name);
        if let Some(tensor) = map.get(&key) {
            if let Some(value) = tensor.to_array2() {
                if value.raw_dim() == param.value.raw_dim() {
                    param.value = value;
                }
            }
        }
    }
    map.get(STEP_KEY)
        .and_then(|t| t.data.first())
        .map_or(0, |&s| s.max(0.0) as u64)
}

/// Write weights and preprocessing metadata into a directory
pub fn save_dir(dir: &Path, map: &ParamMap, train_params: &TrainParams) -> Result<()> {
    fs::create_dir_all(dir)
        .map_err(|e| ParamsError::Write { path: dir.display().to_string(), source: e })?;

    let model_path = dir.join(MODEL_FILE);
    let model_json = serde_json::to_string(map)
        .map_err(|e| ParamsError::Corrupt { path: MODEL_FILE.to_string(), reason: e.to_string() })?;
    fs::write(&model_path, model_json)
        .map_err(|e| ParamsError::Write { path: model_path.display().to_string(), source: e })?;

    let tp_path = dir.join(TRAIN_PARAMS_FILE);
    let tp_json = serde_json::to_string(train_params).map_err(|e| ParamsError::Corrupt {
        path: TRAIN_PARAMS_FILE.to_string(),
        reason: e.to_string(),
    })?;
    fs::write(&tp_path, tp_json)
        .map_err(|e| ParamsError::Write { path: tp_path.display().to_string(), source: e })?;

    Ok(())
}

/// Read weights and preprocessing metadata back from a directory
///
/// Missing or unparseable files are fatal; the caller decides whether to
/// retry the trial.
pub fn load_dir(dir: &Path) -> Result<(ParamMap, TrainParams)> {
    let model_path = dir.join(MODEL_FILE);
    let tp_path = dir.join(TRAIN_PARAMS_FILE);

    if !model_path.exists() {
        return Err(ParamsError::MissingFile(model_path.display().to_string()));
    }
    if !tp_path.exists() {
        return Err(ParamsError::MissingTrainParams);
    }

    let model_json = fs::read_to_string(&model_path)
        .map_err(|e| ParamsError::Read { path: model_path.display().to_string(), source: e })?;
    let map: ParamMap = serde_json::from_str(&model_json).map_err(|e| ParamsError::Corrupt {
        path: model_path.display().to_string(),
        reason: e.to_string(),
    })?;

    let tp_json = fs::read_to_string(&tp_path)
        .map_err(|e| ParamsError::Read { path: tp_path.display().to_string(), source: e })?;
    let train_params: TrainParams =
        serde_json::from_str(&tp_json).map_err(|e| ParamsError::Corrupt {
            path: tp_path.display().to_string(),
            reason: e.to_string(),
        })?;

    Ok((map, train_params))
}

/// In-memory blob: weights payload base64-encoded next to its metadata
#[derive(Debug, Serialize, Deserialize)]
struct Blob {
    model_base64: String,
    train_params: TrainParams,
}

/// Encode weights and metadata into a single JSON blob
pub fn encode_blob(map: &ParamMap, train_params: &TrainParams) -> Result<String> {
    let payload =
        serde_json::to_vec(map).map_err(|e| ParamsError::InvalidBlob(e.to_string()))?;
    let blob = Blob {
        model_base64: STANDARD.encode(payload),
        train_params: train_params.clone(),
    };
    serde_json::to_string(&blob).map_err(|e| ParamsError::InvalidBlob(e.to_string()))
}

/// Decode a blob produced by [`encode_blob`]
pub fn decode_blob(blob: &str) -> Result<(ParamMap, TrainParams)> {
    let blob: Blob =
        serde_json::from_str(blob).map_err(|e| ParamsError::InvalidBlob(e.to_string()))?;
    let payload = STANDARD
        .decode(&blob.model_base64)
        .map_err(|e| ParamsError::InvalidBlob(e.to_string()))?;
    let map: ParamMap =
        serde_json::from_slice(&payload).map_err(|e| ParamsError::InvalidBlob(e.to_string()))?;
    Ok((map, blob.train_params))
}
