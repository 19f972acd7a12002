//! Observability and Metrics
//!
//! Counters for connections, requests and received messages, owned by the session.
//!
//! Uses atomic counters so a snapshot can be taken through a shared reference.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Metrics collector for client operations
#[derive(Debug)]
pub struct Metrics {
    /// Total connections established
    pub connections_total: AtomicU64,
    /// Failed connection attempts
    pub connection_errors: AtomicU64,
    /// Total requests written
    pub requests_sent: AtomicU64,
    /// Total bytes written to the server
    pub bytes_sent: AtomicU64,
    /// Total content bytes received with pending messages
    pub bytes_received: AtomicU64,
    /// Pending messages received
    pub messages_received: AtomicU64,
    /// Pending messages that could not be decrypted
    pub undecryptable_messages: AtomicU64,
    /// Protocol errors
    pub protocol_errors: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            requests_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            undecryptable_messages: AtomicU64::new(0),
            protocol_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a new connection
    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection error
    pub fn connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request written to the server
    pub fn request_sent(&self, byte_count: u64) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a pending message received
    pub fn message_received(&self, byte_count: u64) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a message that could not be decrypted
    pub fn undecryptable_message(&self) {
        self.undecryptable_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a protocol error
    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            undecryptable_messages: self.undecryptable_messages.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connection_errors = snapshot.connection_errors,
            requests_sent = snapshot.requests_sent,
            bytes_sent = snapshot.bytes_sent,
            bytes_received = snapshot.bytes_received,
            messages_received = snapshot.messages_received,
            undecryptable_messages = snapshot.undecryptable_messages,
            protocol_errors = snapshot.protocol_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Client metrics"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`Metrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connection_errors: u64,
    pub requests_sent: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub messages_received: u64,
    pub undecryptable_messages: u64,
    pub protocol_errors: u64,
    pub uptime_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = Metrics::new();
        metrics.connection_established();
        metrics.request_sent(23);
        metrics.request_sent(100);
        metrics.message_received(64);
        metrics.undecryptable_message();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connections_total, 1);
        assert_eq!(snapshot.requests_sent, 2);
        assert_eq!(snapshot.bytes_sent, 123);
        assert_eq!(snapshot.bytes_received, 64);
        assert_eq!(snapshot.undecryptable_messages, 1);
        assert_eq!(snapshot.protocol_errors, 0);
    }
}
