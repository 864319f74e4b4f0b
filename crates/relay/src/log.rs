//! # Synchronized Logs
//!
//! Two line-oriented writers shared between threads:
//!
//! - [`SyncLog`]: one sink behind one lock. The sink is opened on the first
//!   write, exactly once, however many threads race for it.
//! - [`DualSinkLog`]: every line goes to two sinks, each behind its own lock.
//!   Callers may name the sinks in either order; both orders take the pair
//!   through [`LockPair`], so two writers can never hold one lock each.

use parking_lot::{Mutex, Once};
use relay_core::{LockPair, StartWith};
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type Sink = Box<dyn Write + Send>;

/// In-memory sink that can be cloned and inspected after writing.
#[derive(Clone, Debug, Default)]
pub struct MemorySink(Arc<Mutex<Vec<u8>>>);

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded as UTF-8.
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    /// Written lines in order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Where a [`SyncLog`] writes.
#[derive(Clone, Debug)]
pub enum LogTarget {
    /// Process stdout.
    Stdout,
    /// A file opened for appending, created if missing.
    File(PathBuf),
    /// An in-memory buffer.
    Buffer(MemorySink),
}

impl LogTarget {
    fn open(&self) -> Sink {
        match self {
            Self::Stdout => Box::new(io::stdout()),
            Self::Buffer(sink) => Box::new(sink.clone()),
            Self::File(path) => match OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => Box::new(file),
                Err(e) => {
                    tracing::warn!(
                        "failed to open log file {}: {}, falling back to stdout",
                        path.display(),
                        e
                    );
                    Box::new(io::stdout())
                }
            },
        }
    }
}

/// A log whose lines are written whole, one writer at a time.
///
/// ```rust
/// use relay::log::{LogTarget, MemorySink, SyncLog};
///
/// let buffer = MemorySink::new();
/// let log = SyncLog::new(LogTarget::Buffer(buffer.clone()));
/// log.log("hello").unwrap();
/// assert_eq!(buffer.lines(), vec!["hello"]);
/// ```
pub struct SyncLog {
    target: LogTarget,
    open: Once,
    sink: Mutex<Option<Sink>>,
    opens: AtomicUsize,
}

impl SyncLog {
    /// Creates a log for `target`. Nothing is opened until the first line.
    #[must_use]
    pub fn new(target: LogTarget) -> Self {
        Self {
            target,
            open: Once::new(),
            sink: Mutex::new(None),
            opens: AtomicUsize::new(0),
        }
    }

    /// Writes one line.
    ///
    /// # Errors
    ///
    /// Any I/O error from the sink.
    pub fn log(&self, line: &str) -> io::Result<()> {
        self.open.call_once(|| {
            *self.sink.lock() = Some(self.target.open());
            self.opens.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(sink = ?self.target, "log sink opened");
        });

        let mut sink = self.sink.lock();
        match sink.as_mut() {
            Some(writer) => writeln!(writer, "{line}"),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "log sink not open")),
        }
    }

    /// Flushes the sink if it has been opened.
    ///
    /// # Errors
    ///
    /// Any I/O error from the sink.
    pub fn flush(&self) -> io::Result<()> {
        match self.sink.lock().as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }

    /// How many times the sink has been opened: 0 before the first line,
    /// 1 after.
    #[must_use]
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for SyncLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncLog")
            .field("target", &self.target)
            .field("opens", &self.opens())
            .finish_non_exhaustive()
    }
}

/// A log that mirrors every line into two sinks.
pub struct DualSinkLog {
    sinks: LockPair<Sink, Sink>,
}

impl DualSinkLog {
    /// Creates a log over `primary` and `secondary`.
    pub fn new<P, S>(primary: P, secondary: S) -> Self
    where
        P: Write + Send + 'static,
        S: Write + Send + 'static,
    {
        Self {
            sinks: LockPair::new(Box::new(primary), Box::new(secondary)),
        }
    }

    /// Locks the primary sink first, then writes `line` to both.
    ///
    /// # Errors
    ///
    /// The first I/O error from either sink.
    pub fn log_primary_first(&self, line: &str) -> io::Result<()> {
        let (mut primary, mut secondary) = self.sinks.lock_from(StartWith::First);
        writeln!(primary, "{line}")?;
        writeln!(secondary, "{line}")
    }

    /// Locks the secondary sink first, then writes `line` to both.
    ///
    /// # Errors
    ///
    /// The first I/O error from either sink.
    pub fn log_secondary_first(&self, line: &str) -> io::Result<()> {
        let (mut primary, mut secondary) = self.sinks.lock_from(StartWith::Second);
        writeln!(secondary, "{line}")?;
        writeln!(primary, "{line}")
    }

    /// Flushes both sinks.
    ///
    /// # Errors
    ///
    /// The first I/O error from either sink.
    pub fn flush(&self) -> io::Result<()> {
        let (mut primary, mut secondary) = self.sinks.lock();
        primary.flush()?;
        secondary.flush()
    }
}

impl fmt::Debug for DualSinkLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DualSinkLog").finish_non_exhaustive()
    }
}
