//! Message handling: classification, reply formatting and the channel pipeline.

pub mod channel;
pub mod classifier;
pub mod format;

pub use channel::Channel;
pub use classifier::{Disposition, ResponseLength, classify};
