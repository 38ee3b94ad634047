//! Freehand stroke capture and post-processing.

mod filter;
mod pipeline;
mod recognizer;
mod simplify;

pub use filter::OneEuroFilter;
pub use pipeline::{EraseOutcome, StrokeInput, StrokeOutcome};
pub use recognizer::{Recognition, ShapeKind, ShapeRecognizer, resample};
pub use simplify::{path_length, perpendicular_distance, simplify, straightness};
