pub mod buffer;
pub mod controller;
pub mod loop_worker;
pub mod processor;

pub use buffer::EventBuffer;
pub use controller::StreamingController;
pub use loop_worker::{streaming_loop, StreamStats};
pub use processor::StreamingProcessor;
