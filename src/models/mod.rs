//! Example model definitions
//!
//! Two image classifiers implementing the [`TunableModel`](crate::model::TunableModel)
//! lifecycle contract:
//!
//! - [`SoftmaxImage`] - linear softmax over flattened pixels, trained with
//!   Nesterov SGD under a milestone LR schedule, sharing parameters across
//!   trials;
//! - [`MlpImage`] - one hidden ReLU layer trained with Adam, no parameter
//!   sharing.
//!
//! Both use closed-form gradients; there is no autodiff here. They exist
//! to exercise the SDK end-to-end and as templates for real definitions.

pub mod loss;

mod mlp;
mod softmax;

pub use mlp::{MlpImage, MlpNet};
pub use softmax::{SoftmaxImage, SoftmaxNet};
