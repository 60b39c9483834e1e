//! Keeps a team's message board in sync with the server.
//!
//! `freshness` holds the pure commit/notify decisions, `policy` the timing,
//! and `poll_loop` the owned task that ties them to timers and triggers.

mod events;
mod freshness;
mod policy;
mod poll_loop;

pub use events::{notice_for, BoardEvent, Notice};
pub use freshness::{
    compare_timestamps, decide_freshness, parse_timestamp, BoardState, DecideFreshnessParams,
    FreshnessDecision,
};
pub use policy::{backoff_delay, AppPhase, PollPhase, DEFAULT_MAX_BACKOFF, DEFAULT_POLL_INTERVAL};
pub use poll_loop::{FreshnessPoller, PollOutcome, PollTrigger, PollerConfig, PollerHandle};

use crate::types::MessageBoard;
use std::fmt::Display;
use std::future::Future;

/// Source of board snapshots. Implemented by the authenticated message board
/// API; tests plug in scripted boards.
pub trait BoardFetcher: Send + Sync + 'static {
    type Error: Display + Send + 'static;

    fn fetch_board(
        &self,
        team_id: &str,
    ) -> impl Future<Output = Result<MessageBoard, Self::Error>> + Send;
}
