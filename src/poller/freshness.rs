use crate::types::Message;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::cmp::Ordering;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses RFC 3339, or a naive ISO-8601 timestamp taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
  let value = value.trim();
  if value.is_empty() {
    return None;
  }
  if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
    return Some(dt.with_timezone(&Utc));
  }
  NAIVE_FORMATS
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
    .map(|naive| naive.and_utc())
}

/// Orders two `created_at` values, falling back to plain string order when
/// either side does not parse.
pub fn compare_timestamps(a: &str, b: &str) -> Ordering {
  match (parse_timestamp(a), parse_timestamp(b)) {
    (Some(a), Some(b)) => a.cmp(&b),
    _ => a.trim().cmp(b.trim()),
  }
}

fn is_newer(candidate: &str, than: Option<&str>) -> bool {
  match than {
    None => true,
    Some(than) => compare_timestamps(candidate, than) == Ordering::Greater,
  }
}

/// What the poller has committed for one board.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardState {
  pub last_seen_timestamp: Option<String>,
  /// Newest `created_at` ever committed. Never decreases, so a message that
  /// disappears and comes back is not announced twice.
  pub notified_high_water: Option<String>,
  pub committed_seq: u64,
  pub initialized: bool,
  /// Most-recent-first.
  pub presented: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FreshnessDecision {
  pub stale: bool,
  pub tail_changed: bool,
  pub list_changed: bool,
  /// Server order, oldest first.
  pub new_messages: Vec<Message>,
}

impl FreshnessDecision {
  pub fn is_noop(&self) -> bool {
    self.stale || (!self.tail_changed && !self.list_changed)
  }
}

pub struct DecideFreshnessParams<'a> {
  pub state: &'a BoardState,
  pub snapshot: &'a [Message],
  /// Start order of the fetch that produced `snapshot`.
  pub seq: u64,
  pub notify: bool,
}

fn is_stale(params: &DecideFreshnessParams<'_>) -> bool {
  if params.seq >= params.state.committed_seq {
    return false;
  }
  match params.snapshot.last() {
    Some(tail) => !is_newer(&tail.created_at, params.state.last_seen_timestamp.as_deref()),
    None => true,
  }
}

fn presented_matches(presented: &[Message], snapshot: &[Message]) -> bool {
  presented.len() == snapshot.len() && presented.iter().eq(snapshot.iter().rev())
}

pub fn decide_freshness(params: DecideFreshnessParams<'_>) -> FreshnessDecision {
  if is_stale(&params) {
    return FreshnessDecision {
      stale: true,
      tail_changed: false,
      list_changed: false,
      new_messages: Vec::new(),
    };
  }

  let state = params.state;
  let tail_changed = params
    .snapshot
    .last()
    .is_some_and(|tail| state.last_seen_timestamp.as_deref() != Some(tail.created_at.as_str()));
  let list_changed = !presented_matches(&state.presented, params.snapshot);

  let new_messages = if params.notify && state.initialized && tail_changed {
    let high_water = state.notified_high_water.as_deref();
    params
      .snapshot
      .iter()
      .filter(|m| is_newer(&m.created_at, high_water))
      .cloned()
      .collect()
  } else {
    Vec::new()
  };

  FreshnessDecision {
    stale: false,
    tail_changed,
    list_changed,
    new_messages,
  }
}

impl BoardState {
  pub fn commit(&mut self, snapshot: &[Message], seq: u64, decision: &FreshnessDecision) {
    if decision.stale {
      return;
    }
    self.committed_seq = self.committed_seq.max(seq);
    self.initialized = true;

    if let Some(tail) = snapshot.last() {
      self.last_seen_timestamp = Some(tail.created_at.clone());
      if is_newer(&tail.created_at, self.notified_high_water.as_deref()) {
        self.notified_high_water = Some(tail.created_at.clone());
      }
    }
    if decision.list_changed {
      self.presented = snapshot.iter().rev().cloned().collect();
    }
  }
}
