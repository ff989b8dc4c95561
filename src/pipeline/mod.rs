//! Input and Output Pipelines
//!
//! The two halves of the engine's data path. The input pipeline routes
//! caller keystrokes through boundary tracking and interception before
//! they reach the process host; the output pipeline routes host output
//! through history capture, exit resolution, and parser rules before
//! fanning it out to subscribers.

pub mod input;
pub mod output;

// Re-exports for convenience
pub use input::InputPipeline;
pub use output::{ChunkCallback, OutputPipeline, Subscription};
