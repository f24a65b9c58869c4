//! Statistics and counters for the relay

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Relay-wide counters
///
/// Updated with relaxed atomics from every connection task; read through
/// [`RelayStats::snapshot`].
#[derive(Debug)]
pub struct RelayStats {
    started_at: Instant,
    connections_accepted: AtomicU64,
    connections_active: AtomicU64,
    events_received: AtomicU64,
    malformed_events: AtomicU64,
    messages_forwarded: AtomicU64,
    messages_dropped: AtomicU64,
    incidents_recorded: AtomicU64,
    incident_failures: AtomicU64,
    signals_observed: AtomicU64,
}

/// Point-in-time copy of [`RelayStats`] plus registry gauges
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStatsSnapshot {
    /// Time since the stats were created
    pub uptime: Duration,
    /// Total connections ever accepted
    pub connections_accepted: u64,
    /// Connections currently open
    pub connections_active: u64,
    /// Inbound events decoded
    pub events_received: u64,
    /// Events dropped for missing fields or bad encoding
    pub malformed_events: u64,
    /// Messages queued to recipients
    pub messages_forwarded: u64,
    /// Messages dropped on full or closed queues
    pub messages_dropped: u64,
    /// Incidents accepted by the notifier
    pub incidents_recorded: u64,
    /// Incidents the notifier failed to record
    pub incident_failures: u64,
    /// Rescue/help/safe signals seen
    pub signals_observed: u64,
    /// Identities currently registered
    pub field_clients: usize,
    /// Non-empty subscription rooms
    pub rooms: usize,
    /// Connections registered as monitors
    pub monitors: usize,
}

fn bump(counter: &AtomicU64, n: u64) {
    counter.fetch_add(n, Ordering::Relaxed);
}

fn read(counter: &AtomicU64) -> u64 {
    counter.load(Ordering::Relaxed)
}

impl RelayStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            connections_accepted: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            events_received: AtomicU64::new(0),
            malformed_events: AtomicU64::new(0),
            messages_forwarded: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            incidents_recorded: AtomicU64::new(0),
            incident_failures: AtomicU64::new(0),
            signals_observed: AtomicU64::new(0),
        }
    }

    /// Record an accepted connection
    pub fn connection_opened(&self) {
        bump(&self.connections_accepted, 1);
        bump(&self.connections_active, 1);
    }

    /// Record a finished connection
    pub fn connection_closed(&self) {
        // Saturating so an unmatched close cannot wrap
        let _ = self
            .connections_active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Record a decoded inbound event
    pub fn event_received(&self) {
        bump(&self.events_received, 1);
    }

    /// Record an event dropped as malformed
    pub fn malformed_event(&self) {
        bump(&self.malformed_events, 1);
    }

    /// Record messages queued for recipients
    pub fn forwarded(&self, n: u64) {
        bump(&self.messages_forwarded, n);
    }

    /// Record messages dropped on full or closed queues
    pub fn dropped(&self, n: u64) {
        bump(&self.messages_dropped, n);
    }

    /// Record a persisted incident
    pub fn incident_recorded(&self) {
        bump(&self.incidents_recorded, 1);
    }

    /// Record an incident the notifier failed to persist
    pub fn incident_failed(&self) {
        bump(&self.incident_failures, 1);
    }

    /// Record a safety signal
    pub fn signal_observed(&self) {
        bump(&self.signals_observed, 1);
    }

    /// Copy the counters; registry gauges are left at zero
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            uptime: self.started_at.elapsed(),
            connections_accepted: read(&self.connections_accepted),
            connections_active: read(&self.connections_active),
            events_received: read(&self.events_received),
            malformed_events: read(&self.malformed_events),
            messages_forwarded: read(&self.messages_forwarded),
            messages_dropped: read(&self.messages_dropped),
            incidents_recorded: read(&self.incidents_recorded),
            incident_failures: read(&self.incident_failures),
            signals_observed: read(&self.signals_observed),
            ..RelayStatsSnapshot::default()
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stats_are_zero() {
        let snapshot = RelayStats::new().snapshot();

        assert_eq!(snapshot.connections_accepted, 0);
        assert_eq!(snapshot.connections_active, 0);
        assert_eq!(snapshot.events_received, 0);
        assert_eq!(snapshot.messages_forwarded, 0);
        assert_eq!(snapshot.messages_dropped, 0);
        assert_eq!(snapshot.incidents_recorded, 0);
    }

    #[test]
    fn test_connection_gauge() {
        let stats = RelayStats::new();

        stats.connection_opened();
        stats.connection_opened();
        stats.connection_closed();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.connections_accepted, 2);
        assert_eq!(snapshot.connections_active, 1);
    }

    #[test]
    fn test_connection_gauge_does_not_underflow() {
        let stats = RelayStats::new();

        stats.connection_closed();

        assert_eq!(stats.snapshot().connections_active, 0);
    }

    #[test]
    fn test_counters() {
        let stats = RelayStats::new();

        stats.event_received();
        stats.malformed_event();
        stats.forwarded(3);
        stats.dropped(1);
        stats.incident_recorded();
        stats.incident_failed();
        stats.signal_observed();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.events_received, 1);
        assert_eq!(snapshot.malformed_events, 1);
        assert_eq!(snapshot.messages_forwarded, 3);
        assert_eq!(snapshot.messages_dropped, 1);
        assert_eq!(snapshot.incidents_recorded, 1);
        assert_eq!(snapshot.incident_failures, 1);
        assert_eq!(snapshot.signals_observed, 1);
    }
}
