//! Events pushed to live-update subscribers.
//!
//! Two wire shapes, tagged by `type`: a queue-depth snapshot sent after
//! every enqueue and worker state change, and a completion notice that
//! lets clients refresh their gallery without polling. Best-effort — a
//! subscriber connected at publish time receives the message, one
//! connecting a moment later relies on the connect-time snapshot instead.

use serde::{Deserialize, Serialize};

use crate::model::{Artwork, QueueCounts};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    QueueUpdate { waiting: i64, active: i64 },
    ArtworkCompleted { artwork: Artwork },
}

impl ClientEvent {
    pub fn queue_update(counts: QueueCounts) -> Self {
        Self::QueueUpdate {
            waiting: counts.waiting,
            active: counts.active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_update_wire_shape() {
        let event = ClientEvent::queue_update(QueueCounts {
            waiting: 3,
            active: 1,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "queue_update");
        assert_eq!(json["waiting"], 3);
        assert_eq!(json["active"], 1);
    }
}
