use tokio::time::{Duration, Instant};

use crate::models::StreamEvent;

pub const DEFAULT_MAX_EVENTS: usize = 100;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Collects stream events into windows bounded by size or age.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<StreamEvent>,
    max_events: usize,
    timeout: Duration,
    window_started: Option<Instant>,
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENTS, DEFAULT_TIMEOUT)
    }
}

impl EventBuffer {
    pub fn new(max_events: usize, timeout: Duration) -> Self {
        let max_events = max_events.max(1);
        Self {
            events: Vec::with_capacity(max_events),
            max_events,
            timeout,
            window_started: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Add an event. Returns true once the window is full.
    pub fn push(&mut self, event: StreamEvent) -> bool {
        if self.events.is_empty() {
            self.window_started = Some(Instant::now());
        }
        self.events.push(event);
        self.events.len() >= self.max_events
    }

    /// True when a non-empty window has been open for at least `timeout`.
    pub fn is_due(&self, now: Instant) -> bool {
        match self.window_started {
            Some(started) => !self.events.is_empty() && now.duration_since(started) >= self.timeout,
            None => false,
        }
    }

    /// Drain the current window and start a fresh one.
    pub fn take(&mut self) -> Vec<StreamEvent> {
        self.window_started = None;
        std::mem::replace(&mut self.events, Vec::with_capacity(self.max_events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(user: &str) -> StreamEvent {
        StreamEvent::new(user, "Dark", 45.0, Utc::now())
    }

    #[test]
    fn reports_ready_at_capacity() {
        let mut buffer = EventBuffer::new(3, DEFAULT_TIMEOUT);
        assert!(!buffer.push(event("u1")));
        assert!(!buffer.push(event("u2")));
        assert!(buffer.push(event("u3")));

        let drained = buffer.take();
        assert_eq!(drained.len(), 3);
        assert!(buffer.is_empty());
    }

    #[test]
    fn window_age_starts_at_first_event() {
        let mut buffer = EventBuffer::new(10, Duration::from_secs(5));
        let now = Instant::now();
        assert!(!buffer.is_due(now + Duration::from_secs(60)));

        buffer.push(event("u1"));
        assert!(!buffer.is_due(Instant::now()));
        assert!(buffer.is_due(Instant::now() + Duration::from_secs(5)));

        buffer.take();
        assert!(!buffer.is_due(Instant::now() + Duration::from_secs(60)));
    }

    #[test]
    fn defaults_match_stream_settings() {
        let buffer = EventBuffer::default();
        assert_eq!(buffer.timeout(), Duration::from_secs(30));
        assert_eq!(buffer.max_events, 100);
    }
}
