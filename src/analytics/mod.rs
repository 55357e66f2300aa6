//! Access analytics
//!
//! Redirects hand a [`Visit`] to the [`AnalyticsRecorder`], which classifies
//! it, hashes the client address and queues it for a background writer.
//! Recording never blocks or fails a redirect.

pub mod bot;
pub mod models;
pub mod recorder;
pub mod request;
pub mod sink;

pub use bot::{BotDetector, UserAgentBotDetector};
pub use models::{AnalyticsEvent, Visit};
pub use request::IpHasher;
pub use recorder::{AnalyticsRecorder, RecorderSnapshot};
pub use sink::{AnalyticsSink, TracingSink};
