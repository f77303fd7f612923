//! Main-thread log delivery.
//!
//! The host's log sink may only be called from the main thread, while most
//! engine events are emitted on worker threads. [`MainThreadLogLayer`] is a
//! `tracing_subscriber` layer that formats each event into a single line and
//! hands it to the sink through the [`Dispatcher`], so the sink always runs
//! inside [`MainThreadDrain::tick`](crate::MainThreadDrain::tick).
//!
//! ```ignore
//! use tracing_subscriber::prelude::*;
//!
//! tracing_subscriber::registry()
//!     .with(EnvFilter::new("info"))
//!     .with(MainThreadLogLayer::new(dispatcher.clone(), MySink))
//!     .init();
//! ```

use std::fmt::{self, Write as _};
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::dispatch::Dispatcher;

/// Three-channel log sink invoked on the main thread.
pub trait LogSink: Send + Sync + 'static {
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
}

/// Layer forwarding formatted events to a [`LogSink`] via the dispatch queue.
pub struct MainThreadLogLayer<S> {
    dispatcher: Dispatcher,
    sink: Arc<S>,
}

impl<S: LogSink> MainThreadLogLayer<S> {
    pub fn new(dispatcher: Dispatcher, sink: S) -> Self {
        Self {
            dispatcher,
            sink: Arc::new(sink),
        }
    }
}

impl<S, Sub> Layer<Sub> for MainThreadLogLayer<S>
where
    S: LogSink,
    Sub: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, Sub>) {
        let level = *event.metadata().level();
        let message = format_event(event);
        let sink = Arc::clone(&self.sink);

        // Must not log from here: enqueue is on the event path.
        self.dispatcher.enqueue(move || {
            if level == Level::ERROR {
                sink.error(&message);
            } else if level == Level::WARN {
                sink.warning(&message);
            } else {
                sink.info(&message);
            }
        });
    }
}

/// Formats an event as `[target] message key=value ...`.
pub fn format_event(event: &Event<'_>) -> String {
    let mut visitor = LineVisitor::default();
    event.record(&mut visitor);

    let mut line = format!("[{}] {}", event.metadata().target(), visitor.message);
    for (key, value) in visitor.fields {
        let _ = write!(line, " {}={}", key, value);
    }
    line
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: Vec<(&'static str, String)>,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push((field.name(), format!("{:?}", value)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{DispatchQueue, WorkerPool};
    use parking_lot::Mutex;
    use tracing_subscriber::prelude::*;

    #[derive(Clone, Default)]
    struct RecordingSink {
        lines: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl LogSink for RecordingSink {
        fn info(&self, message: &str) {
            self.lines.lock().push(("info".into(), message.into()));
        }
        fn warning(&self, message: &str) {
            self.lines.lock().push(("warning".into(), message.into()));
        }
        fn error(&self, message: &str) {
            self.lines.lock().push(("error".into(), message.into()));
        }
    }

    #[test]
    fn test_events_reach_sink_only_after_tick() {
        let (dispatcher, mut drain) = DispatchQueue::new(Arc::new(WorkerPool::new(1).unwrap()));
        let sink = RecordingSink::default();
        let subscriber =
            tracing_subscriber::registry().with(MainThreadLogLayer::new(dispatcher, sink.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(url = "http://a", attempt = 2, "Retry download");
            tracing::warn!("slow");
            tracing::error!("broken");
        });

        assert!(sink.lines.lock().is_empty());
        assert_eq!(drain.tick(), 3);

        let lines = sink.lines.lock();
        assert_eq!(lines[0].0, "info");
        assert!(lines[0].1.contains("Retry download"));
        assert!(lines[0].1.contains("url=http://a"));
        assert!(lines[0].1.contains("attempt=2"));
        assert_eq!(lines[1].0, "warning");
        assert_eq!(lines[2].0, "error");
        assert!(lines[2].1.ends_with("broken"));
    }

    #[test]
    fn test_events_from_worker_thread_delivered_on_tick() {
        let (dispatcher, mut drain) = DispatchQueue::new(Arc::new(WorkerPool::new(1).unwrap()));
        let sink = RecordingSink::default();
        let subscriber = tracing::Dispatch::new(
            tracing_subscriber::registry().with(MainThreadLogLayer::new(dispatcher, sink.clone())),
        );

        std::thread::spawn(move || {
            tracing::dispatcher::with_default(&subscriber, || {
                tracing::warn!("from worker");
            });
        })
        .join()
        .unwrap();

        assert_eq!(drain.tick(), 1);
        assert_eq!(sink.lines.lock()[0].0, "warning");
    }
}
