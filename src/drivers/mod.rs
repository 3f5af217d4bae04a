// src/drivers/mod.rs
// Sample acquisition and the pipeline that drives the analysis stages.
pub mod buffer;
pub mod device;
pub mod error;
pub mod fft;
pub mod pipeline;
pub mod simulator;
pub mod source;
pub use buffer::{SignalBuffer, TimeSeriesFrame};
pub use device::HttpDeviceSource;
pub use error::PipelineError;
pub use pipeline::{EmotionPipeline, PipelineSettings, RecordedBatch, ViolationPolicy};
pub use simulator::{SimProfile, SimulatedHeadband, SimulatorSettings};
pub use source::{ManualSource, SampleSource};
