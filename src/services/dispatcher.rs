use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::ChangeEvent;

/// Reacts to change events for the tables it is registered on
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &ChangeEvent);

    /// Label used in logs
    fn name(&self) -> &'static str;
}

/// Routes change events to the handlers registered for their table.
///
/// Registration happens during startup through `&mut self`; once wrapped in an
/// `Arc` the registry is read-only and dispatch is lock-free.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<String, Vec<Arc<dyn EventHandler>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` to the handlers for `table`
    pub fn register_handler(&mut self, table: &str, handler: Arc<dyn EventHandler>) {
        tracing::info!(table, handler = handler.name(), "Registered change handler");
        self.handlers
            .entry(table.to_string())
            .or_default()
            .push(handler);
    }

    pub fn handler_count(&self, table: &str) -> usize {
        self.handlers.get(table).map_or(0, Vec::len)
    }

    /// Starts every handler registered for the event's table and returns
    /// immediately with the number started.
    ///
    /// Each handler runs in its own task. A handler that panics is logged and
    /// affects neither its siblings nor the caller. Must be called from within
    /// a Tokio runtime.
    pub fn dispatch(&self, event: ChangeEvent) -> usize {
        let Some(handlers) = self.handlers.get(&event.table_name) else {
            tracing::trace!(table = %event.table_name, "No handlers for table");
            return 0;
        };

        let event = Arc::new(event);
        for handler in handlers {
            let handler = Arc::clone(handler);
            let event = Arc::clone(&event);

            tokio::spawn(async move {
                let name = handler.name();
                let table = event.table_name.clone();
                let task = tokio::spawn(async move { handler.handle(&event).await });

                if let Err(e) = task.await {
                    if e.is_panic() {
                        tracing::warn!(handler = name, table = %table, "Change handler panicked");
                    } else {
                        tracing::warn!(handler = name, table = %table, error = %e, "Change handler aborted");
                    }
                }
            });
        }

        handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChangeEventType;
    use chrono::Utc;
    use serde_json::Map;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Recording {
        label: &'static str,
        seen: mpsc::UnboundedSender<(&'static str, String)>,
    }

    #[async_trait]
    impl EventHandler for Recording {
        async fn handle(&self, event: &ChangeEvent) {
            let _ = self.seen.send((self.label, event.table_name.clone()));
        }

        fn name(&self) -> &'static str {
            self.label
        }
    }

    struct Exploding;

    #[async_trait]
    impl EventHandler for Exploding {
        async fn handle(&self, _event: &ChangeEvent) {
            panic!("handler bug");
        }

        fn name(&self) -> &'static str {
            "exploding"
        }
    }

    fn event(table: &str) -> ChangeEvent {
        ChangeEvent {
            table_name: table.to_string(),
            event_type: ChangeEventType::Insert,
            payload: Map::new(),
            timestamp: Utc::now(),
        }
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<(&'static str, String)>) -> (&'static str, String) {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("handler did not run")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_fans_out_to_every_handler_for_table() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_handler(
            "playback_sessions",
            Arc::new(Recording { label: "a", seen: tx.clone() }),
        );
        dispatcher.register_handler(
            "playback_sessions",
            Arc::new(Recording { label: "b", seen: tx.clone() }),
        );
        dispatcher.register_handler(
            "user_ratings",
            Arc::new(Recording { label: "c", seen: tx }),
        );

        assert_eq!(dispatcher.dispatch(event("playback_sessions")), 2);

        let mut labels = vec![next(&mut rx).await.0, next(&mut rx).await.0];
        labels.sort();
        assert_eq!(labels, vec!["a", "b"]);
        assert!(tokio::time::timeout(Duration::from_millis(50), rx.recv())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_unknown_table_is_ignored() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_handler("user_ratings", Arc::new(Recording { label: "a", seen: tx }));

        assert_eq!(dispatcher.dispatch(event("playlists")), 0);
        assert_eq!(dispatcher.handler_count("playlists"), 0);
        assert!(tokio::time::timeout(Duration::from_millis(50), rx.recv())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_panicking_handler_does_not_affect_siblings() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_handler("playback_sessions", Arc::new(Exploding));
        dispatcher.register_handler(
            "playback_sessions",
            Arc::new(Recording { label: "survivor", seen: tx }),
        );

        assert_eq!(dispatcher.dispatch(event("playback_sessions")), 2);
        assert_eq!(next(&mut rx).await, ("survivor", "playback_sessions".to_string()));

        // The dispatcher stays usable after a handler panic
        assert_eq!(dispatcher.dispatch(event("playback_sessions")), 2);
        assert_eq!(next(&mut rx).await.0, "survivor");
    }
}
