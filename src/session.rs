//! A sweep running on a background thread. Rows come back over a bounded
//! channel that the caller drains on its own schedule.

use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, warn};

use crate::bridge::{self, ElevationBridge};
use crate::cleaner::{CancelToken, ProgressRow, RowSink};
use crate::options::{RunOptions, SpecEnablement};
use crate::orchestrator::Cleaner;
use crate::quiesce;
use crate::utils;

pub const CHANNEL_CAPACITY: usize = 1024;

/// How often [`Session::wait`] drains the channel.
pub const TICK: Duration = Duration::from_millis(50);

/// Messages sent from the background thread to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Row(ProgressRow),
    Finished(u64),
}

struct ChannelSink(SyncSender<Event>);

impl RowSink for ChannelSink {
    fn emit(&self, row: ProgressRow) {
        // receiver gone means nobody is watching any more
        let _ = self.0.send(Event::Row(row));
    }
}

/// What to run.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub opts: RunOptions,
    pub enablement: SpecEnablement,
    /// Terminate the target user's programs before a live privileged run.
    pub close_programs: bool,
}

impl Request {
    /// Pick between a privileged worker and an in-process sweep.
    fn execute(self, sink: Arc<dyn RowSink>, cancel: CancelToken) -> u64 {
        if bridge::needs_elevation(&self.opts) {
            let result = ElevationBridge::new().and_then(|b| b.run(&self.opts, &*sink, &cancel));
            return match result {
                Ok(total) => total,
                Err(e) => {
                    warn!(error = %e, "privileged run failed");
                    0
                }
            };
        }

        if self.close_programs
            && !self.opts.dry_run
            && !self.opts.username.is_empty()
            && utils::is_root()
            && !cancel.is_cancelled()
        {
            let exclude = HashSet::from([std::process::id()]);
            quiesce::close_programs(&self.opts.username, &exclude, quiesce::DEFAULT_GRACE);
        }

        Cleaner::new(self.opts, self.enablement, sink)
            .with_cancel_token(cancel)
            .run()
    }
}

pub struct Session {
    receiver: Receiver<Event>,
    cancel: CancelToken,
    handle: Option<JoinHandle<()>>,
    finished: Option<u64>,
}

impl Session {
    pub fn start(request: Request) -> Self {
        Self::start_with(move |sink, cancel| request.execute(sink, cancel))
    }

    /// Run `work` on a background thread. It gets the row sink and the
    /// cancellation token and returns the final total.
    pub fn start_with<F>(work: F) -> Self
    where
        F: FnOnce(Arc<dyn RowSink>, CancelToken) -> u64 + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel::<Event>(CHANNEL_CAPACITY);
        let cancel = CancelToken::new();
        let token = cancel.clone();

        let handle = std::thread::spawn(move || {
            let sink: Arc<dyn RowSink> = Arc::new(ChannelSink(tx.clone()));
            let total = work(sink, token);
            let _ = tx.send(Event::Finished(total));
        });

        Self {
            receiver: rx,
            cancel,
            handle: Some(handle),
            finished: None,
        }
    }

    /// Ask the background run to stop at its next check.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Everything queued so far, without blocking.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if let Event::Finished(total) = event {
                        self.finished = Some(total);
                    }
                    events.push(event);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.finished.is_none() {
                        debug!("background run ended without a total");
                        self.finished = Some(0);
                    }
                    break;
                }
            }
        }
        events
    }

    /// Drain every `tick` until the run finishes, handing each event to
    /// `on_event`. Returns the final total.
    pub fn wait(mut self, tick: Duration, mut on_event: impl FnMut(&Event)) -> u64 {
        loop {
            for event in self.drain() {
                on_event(&event);
            }
            if let Some(total) = self.finished {
                if let Some(handle) = self.handle.take() {
                    if handle.join().is_err() {
                        warn!("background run panicked");
                    }
                }
                return total;
            }
            std::thread::sleep(tick);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::resolver::Resolver;
    use crate::shell::RecordingShell;
    use crate::users::UserHome;
    use std::fs;

    fn row(path: &str, size: u64) -> ProgressRow {
        ProgressRow {
            path: path.into(),
            size_bytes: size,
            modified: "-".into(),
        }
    }

    #[test]
    fn rows_arrive_in_order_before_the_total() {
        let session = Session::start_with(|sink, _| {
            sink.emit(row("/a", 1));
            sink.emit(row("/b", 2));
            3
        });
        let mut seen = Vec::new();
        let total = session.wait(Duration::from_millis(1), |e| seen.push(e.clone()));

        assert_eq!(total, 3);
        assert_eq!(
            seen,
            vec![
                Event::Row(row("/a", 1)),
                Event::Row(row("/b", 2)),
                Event::Finished(3)
            ]
        );
    }

    #[test]
    fn more_rows_than_the_channel_holds() {
        let session = Session::start_with(|sink, _| {
            for i in 0..(CHANNEL_CAPACITY as u64 * 3) {
                sink.emit(row("/x", i));
            }
            7
        });
        let mut rows = 0;
        let total = session.wait(Duration::from_millis(1), |e| {
            if matches!(e, Event::Row(_)) {
                rows += 1;
            }
        });
        assert_eq!(total, 7);
        assert_eq!(rows, CHANNEL_CAPACITY * 3);
    }

    #[test]
    fn cancel_reaches_the_background_run() {
        let session = Session::start_with(|_, cancel| {
            while !cancel.is_cancelled() {
                std::thread::sleep(Duration::from_millis(1));
            }
            11
        });
        session.cancel();
        assert_eq!(session.wait(Duration::from_millis(1), |_| {}), 11);
    }

    #[test]
    fn panicking_run_reports_zero() {
        let session = Session::start_with(|_, _| panic!("boom"));
        assert_eq!(session.wait(Duration::from_millis(1), |_| {}), 0);
    }

    #[test]
    fn drives_a_real_sweep() {
        let home = tempfile::tempdir().unwrap();
        fs::create_dir_all(home.path().join(".cache/app")).unwrap();
        fs::write(home.path().join(".cache/app/blob"), vec![1u8; 64]).unwrap();
        let homes = vec![UserHome {
            name: "tester".into(),
            home: home.path().to_path_buf(),
        }];
        let catalog = Catalog {
            user_paths: vec![".cache/app".into()],
            ..Catalog::default()
        };

        let session = Session::start_with(move |sink, cancel| {
            Cleaner::new(RunOptions::default(), SpecEnablement::new(), sink)
                .with_shell(Arc::new(RecordingShell::new()))
                .with_catalog(catalog)
                .with_resolver(Resolver::with_home(None))
                .with_privileged(false)
                .with_homes(homes)
                .with_cancel_token(cancel)
                .run()
        });
        let mut rows = 0;
        let total = session.wait(TICK, |e| {
            if matches!(e, Event::Row(_)) {
                rows += 1;
            }
        });
        assert_eq!(total, 64);
        assert_eq!(rows, 2);
        assert!(!home.path().join(".cache/app").exists());
    }
}
