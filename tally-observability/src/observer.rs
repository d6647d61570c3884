use http::{HeaderMap, StatusCode};
use std::io;
use tally_core::response::ResponseSink;

/// Status code reported when nothing was ever committed.
pub const STATUS_UNSET: u16 = 0;

/// Whether a status has been committed for the response.
///
/// The only transition is `Uncommitted` → `Committed`; once committed the
/// code never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitState {
    #[default]
    Uncommitted,
    Committed(StatusCode),
}

impl CommitState {
    /// Commit `status` if still uncommitted; a no-op otherwise.
    fn commit(&mut self, status: StatusCode) {
        if *self == CommitState::Uncommitted {
            *self = CommitState::Committed(status);
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            CommitState::Uncommitted => None,
            CommitState::Committed(code) => Some(*code),
        }
    }
}

/// Decorator over a [`ResponseSink`] that records the committed status and
/// the number of body bytes the sink accepted.
///
/// Every call is forwarded unchanged; the observer only keeps books.
/// A body write with no prior status commits `200 OK` first, the same
/// default the protocol layer applies, so the recorded status matches what
/// went out.
pub struct ResponseObserver<'a> {
    inner: &'a mut dyn ResponseSink,
    state: CommitState,
    size: usize,
}

impl<'a> ResponseObserver<'a> {
    pub fn new(inner: &'a mut dyn ResponseSink) -> Self {
        Self {
            inner,
            state: CommitState::Uncommitted,
            size: 0,
        }
    }

    /// Total body bytes accepted by the wrapped sink so far.
    pub fn size(&self) -> usize {
        self.size
    }

    /// First committed status, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.state.status()
    }

    /// Numeric status, [`STATUS_UNSET`] when nothing was committed.
    pub fn status_code(&self) -> u16 {
        self.status().map_or(STATUS_UNSET, |s| s.as_u16())
    }

    pub fn state(&self) -> CommitState {
        self.state
    }
}

impl ResponseSink for ResponseObserver<'_> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn set_status(&mut self, status: StatusCode) {
        self.state.commit(status);
        self.inner.set_status(status);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.state == CommitState::Uncommitted {
            self.set_status(StatusCode::OK);
        }
        let n = self.inner.write(buf)?;
        self.size += n;
        Ok(n)
    }
}
