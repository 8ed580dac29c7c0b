pub mod analytics;
pub mod watch_facts;
