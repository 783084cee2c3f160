//! Pointer event throttling

use crate::{ConnectionSession, Result, SendOutcome};
use liveconn_proto::{Message, MouseMove};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Local pointer position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerPosition {
    /// Horizontal coordinate
    pub x: f32,
    /// Vertical coordinate
    pub y: f32,
}

impl PointerPosition {
    /// Create a position
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Result of offering a pointer event to the throttle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleOutcome {
    /// Too soon after the previous event; nothing was encoded
    Throttled,
    /// Encoded and handed to the session
    Forwarded(SendOutcome),
}

/// Forwards local pointer moves at most once per interval
#[derive(Debug, Clone)]
pub struct PointerThrottle {
    min_interval: Duration,
    last_emit: Option<Instant>,
}

impl PointerThrottle {
    /// Throttle admitting one event per `min_interval`
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_emit: None,
        }
    }

    /// Minimum time between two forwarded events
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Whether an event at `now` would be dropped
    pub fn is_throttled(&self, now: Instant) -> bool {
        match self.last_emit {
            Some(last) => now.saturating_duration_since(last) < self.min_interval,
            None => false,
        }
    }

    /// Offer a pointer position now
    pub fn emit(
        &mut self,
        session: &mut ConnectionSession,
        position: PointerPosition,
    ) -> Result<ThrottleOutcome> {
        self.emit_at(session, position, Instant::now())
    }

    /// Offer a pointer position at `now`
    ///
    /// The interval restarts whenever the session accepted the frame, even if
    /// a guard vetoed or the transport dropped it.
    pub fn emit_at(
        &mut self,
        session: &mut ConnectionSession,
        position: PointerPosition,
        now: Instant,
    ) -> Result<ThrottleOutcome> {
        if self.is_throttled(now) {
            trace!("Pointer event throttled");
            return Ok(ThrottleOutcome::Throttled);
        }

        let name = session.user().name();
        let frame = Message::MouseMove(MouseMove::new(name, position.x, position.y)).to_frame()?;
        let outcome = session.send(frame)?;

        self.last_emit = Some(now);
        Ok(ThrottleOutcome::Forwarded(outcome))
    }
}

impl Default for PointerThrottle {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}
