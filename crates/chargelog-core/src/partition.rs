//! Per-connector grouping of normalized events.

use std::collections::BTreeMap;

use crate::event::{Command, ConnectorId, RawEvent};

/// Connectors reported on for every upload.
pub const TRACKED_CONNECTORS: [ConnectorId; 2] = [ConnectorId(1), ConnectorId(2)];

/// Events grouped per connector, each group in chronological order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partitioned {
    /// One entry per tracked connector, possibly empty.
    pub by_connector: BTreeMap<ConnectorId, Vec<RawEvent>>,
    /// Events that could not be delivered to any tracked connector.
    pub unrouted: usize,
}

/// Groups events by connector and sorts each group by timestamp.
///
/// Charger-wide events (connector `0`) are delivered to every tracked
/// connector, except transaction starts, which cannot be attributed. The sort
/// is stable so input order breaks timestamp ties.
pub fn partition(events: Vec<RawEvent>, tracked: &[ConnectorId]) -> Partitioned {
    let mut by_connector: BTreeMap<ConnectorId, Vec<RawEvent>> =
        tracked.iter().map(|id| (*id, Vec::new())).collect();
    let mut unrouted = 0;

    for event in events {
        if event.connector.is_charger_wide() && event.command != Command::StartTransaction {
            for bucket in by_connector.values_mut() {
                bucket.push(event.clone());
            }
            if tracked.is_empty() {
                unrouted += 1;
            }
        } else if let Some(bucket) = by_connector.get_mut(&event.connector) {
            bucket.push(event);
        } else {
            tracing::debug!(
                row = event.row,
                connector = %event.connector,
                command = %event.command,
                "event not routed to a tracked connector"
            );
            unrouted += 1;
        }
    }

    for bucket in by_connector.values_mut() {
        bucket.sort_by_key(|event| event.timestamp);
    }

    Partitioned {
        by_connector,
        unrouted,
    }
}
