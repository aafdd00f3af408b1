//! Service layer
//!
//! Codec and progress-reporting concerns kept apart from the pixel
//! pipeline, so classification and masking stay pure functions.

pub mod format;
pub mod io;
pub mod progress;

pub use format::OutputFormatHandler;
pub use io::ImageIOService;
pub use progress::{
    BatchItemEvent, BatchProgressUpdate, CallbackProgressReporter, ConsoleProgressReporter,
    NoOpProgressReporter, ProcessingStage, ProgressReporter, ProgressTracker, ProgressUpdate,
};
