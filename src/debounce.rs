use std::time::{Duration, Instant};

/// Trailing-edge debouncer driven by explicit timestamps.
///
/// Each `push` restarts the window; `poll` yields the last pushed value once
/// the window has passed without another push. Nothing fires on the leading
/// edge.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
  delay: Duration,
  pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
  pub fn new(delay: Duration) -> Self {
    Self {
      delay,
      pending: None,
    }
  }

  pub fn push(&mut self, value: T, now: Instant) {
    self.pending = Some((value, now));
  }

  /// The settled value, if the window has elapsed since the last push.
  pub fn poll(&mut self, now: Instant) -> Option<T> {
    match &self.pending {
      Some((_, at)) if now.saturating_duration_since(*at) >= self.delay => {
        self.pending.take().map(|(value, _)| value)
      }
      _ => None,
    }
  }

  /// Settle immediately, e.g. when the user presses enter.
  pub fn flush(&mut self) -> Option<T> {
    self.pending.take().map(|(value, _)| value)
  }

  pub fn is_pending(&self) -> bool {
    self.pending.is_some()
  }
}
