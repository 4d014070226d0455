use std::io;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use crate::source::WorldSource;

use super::{BlockMatch, CancelToken, ScanReport, Scanner};

/// The receiving side went away; used to stop workers.
#[derive(Debug)]
struct StreamClosed;

/// A lazy, bounded stream of matches from a scan running in the background.
///
/// Workers block once `capacity` matches are waiting, so a slow consumer
/// throttles the scan instead of buffering it. Dropping the stream stops
/// the scan and waits for in-flight containers to wind down; the token given
/// in [`ScanOptions`](super::ScanOptions) is left untouched.
pub struct MatchStream {
    rx: Option<Receiver<BlockMatch>>,
    cancel: CancelToken,
    worker: Option<JoinHandle<ScanReport>>,
    exhausted: bool,
}

impl<S> Scanner<S>
where
    S: WorldSource + Send + 'static,
{
    pub fn into_stream(mut self, capacity: usize) -> io::Result<MatchStream> {
        let (tx, rx) = mpsc::sync_channel(capacity);
        let cancel = self.options.cancel.child();
        self.options.cancel = cancel.clone();
        let worker = thread::Builder::new()
            .name("blockscan-stream".into())
            .spawn(move || {
                let outcome = self.for_each_match(|m| tx.send(m).map_err(|_| StreamClosed));
                outcome.report
            })?;

        Ok(MatchStream {
            rx: Some(rx),
            cancel,
            worker: Some(worker),
            exhausted: false,
        })
    }
}

impl MatchStream {
    /// Stop early (if needed) and return the scan report.
    pub fn finish(mut self) -> ScanReport {
        self.shutdown().unwrap_or_default()
    }

    fn shutdown(&mut self) -> Option<ScanReport> {
        if !self.exhausted {
            self.cancel.cancel();
        }
        // Unblocks any worker waiting on a full channel.
        self.rx.take();
        let worker = self.worker.take()?;
        match worker.join() {
            Ok(report) => Some(report),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

impl Iterator for MatchStream {
    type Item = BlockMatch;

    fn next(&mut self) -> Option<BlockMatch> {
        let next = self.rx.as_ref()?.recv().ok();
        if next.is_none() {
            self.exhausted = true;
        }
        next
    }
}

impl Drop for MatchStream {
    fn drop(&mut self) {
        if self.worker.is_some() && !thread::panicking() {
            self.shutdown();
        }
    }
}
