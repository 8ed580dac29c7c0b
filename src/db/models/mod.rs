pub mod analytics;
pub mod warehouse;

pub use analytics::{
    AnalyticsSummary, RecentActivity, ShowActivity, ShowAnalytics, UserAnalytics, ViewerActivity,
};
pub use warehouse::{LoadSummary, ShowDim, UserDim};
