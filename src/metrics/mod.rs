//! Application metrics: instruments, the shared buffer, and the exporter.

mod exporter;
mod instruments;
pub mod payload;
mod point;
mod registry;

pub use exporter::MetricsExporter;
pub use instruments::{Counter, Gauge, Histogram, Instruments, MetricError};
pub use payload::{MetricData, MetricsPayload};
pub use point::{tags, MetricKind, MetricPoint, Tags};
pub use registry::{MetricsRegistry, RegistryConfig};
