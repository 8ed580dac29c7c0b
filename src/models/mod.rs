pub mod enriched;
pub mod stream_event;
pub mod watch_event;

pub use enriched::EnrichedWatchRecord;
pub use stream_event::{ErrorEvent, ProcessedEvent, StreamEvent};
pub use watch_event::WatchEvent;
