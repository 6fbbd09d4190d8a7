use serde::Serialize;
use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::sync::Mutex;

pub const ATTENDANCE_UPDATED: &str = "attendance_updated";

/// Invalidation hint. Observers refetch; the event itself carries no data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupEvent {
    pub event: &'static str,
    pub group_id: String,
}

/// Fire-and-forget fan-out of "this group changed".
pub trait Notifier {
    fn notify_group_changed(&self, group_id: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub fn id(self) -> u64 {
        self.0
    }

    pub fn from_id(id: u64) -> Self {
        SubscriptionHandle(id)
    }
}

struct Subscriber {
    handle: SubscriptionHandle,
    sink: Sender<GroupEvent>,
}

#[derive(Default)]
struct Rooms {
    next_id: u64,
    by_group: HashMap<String, Vec<Subscriber>>,
}

#[derive(Default)]
pub struct SubscriptionHub {
    rooms: Mutex<Rooms>,
}

impl SubscriptionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, group_id: &str, sink: Sender<GroupEvent>) -> SubscriptionHandle {
        let mut rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        rooms.next_id += 1;
        let handle = SubscriptionHandle(rooms.next_id);
        rooms
            .by_group
            .entry(group_id.to_string())
            .or_default()
            .push(Subscriber { handle, sink });
        tracing::debug!(group_id, subscription = handle.0, "subscribed");
        handle
    }

    /// Returns the group the handle was subscribed to, if it was live.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> Option<String> {
        let mut rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        let mut found = None;
        for (group_id, subs) in rooms.by_group.iter_mut() {
            let before = subs.len();
            subs.retain(|s| s.handle != handle);
            if subs.len() != before {
                found = Some(group_id.clone());
                break;
            }
        }
        if let Some(group_id) = &found {
            if rooms.by_group.get(group_id).is_some_and(|s| s.is_empty()) {
                rooms.by_group.remove(group_id);
            }
        }
        found
    }

    pub fn subscriber_count(&self, group_id: &str) -> usize {
        let rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        rooms.by_group.get(group_id).map(|s| s.len()).unwrap_or(0)
    }
}

impl Notifier for SubscriptionHub {
    fn notify_group_changed(&self, group_id: &str) {
        let mut rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        let Some(subs) = rooms.by_group.get_mut(group_id) else {
            return;
        };
        let event = GroupEvent {
            event: ATTENDANCE_UPDATED,
            group_id: group_id.to_string(),
        };
        // Receivers that went away are dropped silently.
        subs.retain(|s| s.sink.send(event.clone()).is_ok());
        tracing::debug!(group_id, delivered = subs.len(), "group change broadcast");
        if subs.is_empty() {
            rooms.by_group.remove(group_id);
        }
    }
}
