//! In-process event bus

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::event::{DomainEvent, EventBus, EventListener};

/// Delivers each event to every subscribed listener in subscription order.
///
/// A failing listener is logged and skipped; the remaining listeners still
/// receive the event.
#[derive(Debug, Default)]
pub struct InProcessEventBus {
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl InProcessEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn EventListener>) {
        match self.listeners.write() {
            Ok(mut listeners) => listeners.push(listener),
            Err(_) => warn!("Event listener registry poisoned; subscription dropped"),
        }
    }

    fn interested(&self, event: &DomainEvent) -> Vec<Arc<dyn EventListener>> {
        let Ok(listeners) = self.listeners.read() else {
            warn!("Event listener registry poisoned");
            return Vec::new();
        };

        listeners
            .iter()
            .filter(|listener| {
                let kinds = listener.kinds();
                kinds.is_empty() || kinds.contains(&event.kind)
            })
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventBus for InProcessEventBus {
    async fn publish(&self, event: DomainEvent) {
        let listeners = self.interested(&event);
        debug!(
            event_id = %event.id,
            kind = %event.kind,
            team_id = %event.team_id,
            listeners = listeners.len(),
            "Publishing domain event"
        );

        for listener in listeners {
            if let Err(e) = listener.handle(&event).await {
                warn!(
                    event_id = %event.id,
                    kind = %event.kind,
                    listener = ?listener,
                    error = %e,
                    "Event listener failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::{EventKind, MockEventListener};
    use crate::domain::ids::TeamId;
    use crate::domain::principal::PrincipalRef;
    use crate::domain::DomainError;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingListener {
        kinds: Vec<EventKind>,
        seen: Mutex<Vec<EventKind>>,
    }

    #[async_trait]
    impl EventListener for RecordingListener {
        fn kinds(&self) -> Vec<EventKind> {
            self.kinds.clone()
        }

        async fn handle(&self, event: &DomainEvent) -> Result<(), DomainError> {
            self.seen.lock().unwrap().push(event.kind);
            Ok(())
        }
    }

    fn event(kind: EventKind) -> DomainEvent {
        DomainEvent::new(
            kind,
            TeamId::generate(),
            PrincipalRef::user("1"),
            json!({}),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_listeners_filter_by_kind() {
        let bus = InProcessEventBus::new();
        let all = Arc::new(RecordingListener::default());
        let invitations = Arc::new(RecordingListener {
            kinds: vec![EventKind::InvitationSent],
            ..Default::default()
        });
        bus.subscribe(all.clone());
        bus.subscribe(invitations.clone());

        bus.publish(event(EventKind::TeamCreated)).await;
        bus.publish(event(EventKind::InvitationSent)).await;

        assert_eq!(
            *all.seen.lock().unwrap(),
            vec![EventKind::TeamCreated, EventKind::InvitationSent]
        );
        assert_eq!(*invitations.seen.lock().unwrap(), vec![EventKind::InvitationSent]);
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_block_others() {
        let bus = InProcessEventBus::new();

        let mut failing = MockEventListener::new();
        failing.expect_kinds().returning(Vec::new);
        failing
            .expect_handle()
            .times(1)
            .returning(|_| Err(DomainError::internal("boom")));

        let recorder = Arc::new(RecordingListener::default());
        bus.subscribe(Arc::new(failing));
        bus.subscribe(recorder.clone());

        bus.publish(event(EventKind::MemberJoined)).await;

        assert_eq!(*recorder.seen.lock().unwrap(), vec![EventKind::MemberJoined]);
    }
}
