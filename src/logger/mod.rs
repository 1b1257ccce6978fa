//! Logging and metrics sink
//!
//! Training emits three kinds of events to an external collaborator: free
//! text messages, plot declarations (which named series belong on which
//! chart), and batches of named scalar values. The collaborator is
//! abstracted behind the [`LogSink`] trait; [`Logger`] is the cheap
//! cloneable handle that models and the trainer hold.
//!
//! # Example
//!
//! ```
//! use afinar::logger::{Logger, MemorySink};
//!
//! let sink = MemorySink::new();
//! let logger = Logger::new(sink.clone());
//! logger.define_plot("Losses over epochs", &["train_loss", "val_loss"], "epoch");
//! logger.metrics(&[("epoch", 0.0), ("train_loss", 1.25)]);
//! assert_eq!(sink.metric_series("train_loss"), vec![1.25]);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Declaration of a chart the sink should render
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotSpec {
    /// Chart title
    pub title: String,
    /// Named series plotted on the chart
    pub metrics: Vec<String>,
    /// Name of the x-axis value (e.g. "epoch")
    pub x_axis: String,
}

/// One event emitted to the sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogEvent {
    /// Free-text progress message
    Message { at: DateTime<Utc>, text: String },
    /// Chart declaration
    Plot { at: DateTime<Utc>, spec: PlotSpec },
    /// Batch of named scalar values
    Metrics { at: DateTime<Utc>, values: BTreeMap<String, f64> },
}

/// Receiver of log events (the external collaborator seam)
pub trait LogSink: Send {
    /// Consume one event
    fn emit(&mut self, event: LogEvent);
}

/// Sink that prints events to stderr
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn emit(&mut self, event: LogEvent) {
        match event {
            LogEvent::Message { at, text } => {
                eprintln!("[{}] {}", at.format("%H:%M:%S"), text);
            }
            LogEvent::Plot { at, spec } => {
                eprintln!(
                    "[{}] plot '{}' ({}) over {}",
                    at.format("%H:%M:%S"),
                    spec.title,
                    spec.metrics.join(", "),
                    spec.x_axis
                );
            }
            LogEvent::Metrics { at, values } => {
                let rendered: Vec<String> =
                    values.iter().map(|(k, v)| format!("{k}={v:.6}")).collect();
                eprintln!("[{}] {}", at.format("%H:%M:%S"), rendered.join(" "));
            }
        }
    }
}

/// Sink that discards everything
#[derive(Debug, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn emit(&mut self, _event: LogEvent) {}
}

/// Sink that records events in memory, for tests and tooling
///
/// Clones share the same buffer, so a test can keep one clone and hand the
/// other to a [`Logger`].
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<LogEvent>>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Texts of all recorded messages, in order
    pub fn messages(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                LogEvent::Message { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// All recorded values of one named metric, in order
    pub fn metric_series(&self, name: &str) -> Vec<f64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                LogEvent::Metrics { values, .. } => values.get(name).copied(),
                _ => None,
            })
            .collect()
    }

    /// All plot declarations, in order
    pub fn plots(&self) -> Vec<PlotSpec> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                LogEvent::Plot { spec, .. } => Some(spec),
                _ => None,
            })
            .collect()
    }
}

impl LogSink for MemorySink {
    fn emit(&mut self, event: LogEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}

/// Cloneable handle to a shared sink
pub struct Logger {
    sink: Arc<Mutex<dyn LogSink>>,
}

impl Logger {
    /// Wrap a sink
    pub fn new<S: LogSink + 'static>(sink: S) -> Self {
        Self { sink: Arc::new(Mutex::new(sink)) }
    }

    /// Logger printing to stderr
    pub fn console() -> Self {
        Self::new(ConsoleSink)
    }

    /// Logger discarding everything
    pub fn null() -> Self {
        Self::new(NullSink)
    }

    fn emit(&self, event: LogEvent) {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner).emit(event);
    }

    /// Emit a progress message
    pub fn log(&self, text: impl Into<String>) {
        self.emit(LogEvent::Message { at: Utc::now(), text: text.into() });
    }

    /// Declare a chart of named series
    pub fn define_plot(&self, title: &str, metrics: &[&str], x_axis: &str) {
        self.emit(LogEvent::Plot {
            at: Utc::now(),
            spec: PlotSpec {
                title: title.to_string(),
                metrics: metrics.iter().map(|m| (*m).to_string()).collect(),
                x_axis: x_axis.to_string(),
            },
        });
    }

    /// Emit a batch of named scalar values
    pub fn metrics(&self, values: &[(&str, f64)]) {
        self.emit(LogEvent::Metrics {
            at: Utc::now(),
            values: values.iter().map(|(k, v)| ((*k).to_string(), *v)).collect(),
        });
    }
}

impl Clone for Logger {
    fn clone(&self) -> Self {
        Self { sink: Arc::clone(&self.sink) }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::console()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}
