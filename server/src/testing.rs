//! Shared test doubles.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tracing_subscriber::fmt::MakeWriter;

use crate::broker::follow_up::{FollowUpError, FollowUpSink, FollowUpTarget};

/// Follow-up sink that records delivered content after an optional delay.
#[derive(Default)]
pub struct RecordingSink {
    delay: Duration,
    delivered: Mutex<Vec<(FollowUpTarget, String)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn delivered(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(_, content)| content.clone())
            .collect()
    }

    pub fn targets(&self) -> Vec<FollowUpTarget> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(target, _)| target.clone())
            .collect()
    }
}

impl FollowUpSink for RecordingSink {
    fn edit_original<'a>(
        &'a self,
        target: &'a FollowUpTarget,
        content: &'a str,
    ) -> BoxFuture<'a, Result<(), FollowUpError>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            self.delivered
                .lock()
                .unwrap()
                .push((target.clone(), content.to_string()));
            Ok(())
        })
    }
}

/// In-memory log buffer usable as a `tracing_subscriber` writer.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Install a subscriber writing into a fresh buffer for the current thread.
    ///
    /// Only covers tasks polled on this thread, so use it from a
    /// current-thread runtime.
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (logs, guard)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
