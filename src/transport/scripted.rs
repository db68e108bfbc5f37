//! In-memory transport driven by a script.
//!
//! Each request byte written to the link selects the reply queued for it.
//! The script is shared through a cloneable [`Script`] handle so a test can
//! change the controller's behaviour while a hub owns the transport. Reads
//! yield to the runtime once before answering, like a real link would.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::error::LinkError;
use crate::transport::{LinkResult, MAX_LINE_LEN, Transport, timeout_ms};

/// Controller behaviour for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Respond with these bytes.
    Bytes(Bytes),
    /// Say nothing; the read times out.
    Silence,
    /// Fail the read with an I/O error.
    Fail,
}

impl Reply {
    /// A single-byte reply.
    #[must_use]
    pub fn byte(b: u8) -> Self {
        Self::Bytes(Bytes::copy_from_slice(&[b]))
    }

    /// A newline-terminated text reply.
    #[must_use]
    pub fn line(text: &str) -> Self {
        Self::Bytes(Bytes::from(format!("{text}\n")))
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    fail_open: bool,
    replies: HashMap<u8, VecDeque<Reply>>,
    written: Vec<u8>,
    opens: usize,
}

/// Shared handle to the behaviour of a [`ScriptedTransport`].
#[derive(Debug, Clone, Default)]
pub struct Script {
    state: Arc<Mutex<ScriptState>>,
}

impl Script {
    /// Creates an empty script: opens succeed, every request is silent.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Makes subsequent opens fail (or succeed again).
    pub fn fail_open(&self, fail: bool) {
        self.lock().fail_open = fail;
    }

    /// Replaces the replies for `request` with a single sticky reply.
    pub fn respond(&self, request: u8, reply: Reply) {
        self.lock().replies.insert(request, VecDeque::from([reply]));
    }

    /// Queues replies for `request`, consumed in order. The last one sticks.
    pub fn respond_seq(&self, request: u8, replies: impl IntoIterator<Item = Reply>) {
        self.lock()
            .replies
            .insert(request, replies.into_iter().collect());
    }

    /// Returns every byte written so far.
    #[must_use]
    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    /// Forgets the record of written bytes.
    pub fn clear_written(&self) {
        self.lock().written.clear();
    }

    /// Returns how many times the link was actually opened.
    #[must_use]
    pub fn opens(&self) -> usize {
        self.lock().opens
    }

    fn next_reply(&self, request: u8) -> Reply {
        let mut state = self.lock();
        match state.replies.get_mut(&request) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(Reply::Silence),
            Some(queue) => queue.front().cloned().unwrap_or(Reply::Silence),
            None => Reply::Silence,
        }
    }
}

/// Transport backed by a [`Script`] instead of hardware.
#[derive(Debug)]
pub struct ScriptedTransport {
    script: Script,
    open: bool,
    pending: Option<Reply>,
}

impl ScriptedTransport {
    /// Creates a closed transport following `script`.
    #[must_use]
    pub const fn new(script: Script) -> Self {
        Self {
            script,
            open: false,
            pending: None,
        }
    }

    fn take_reply(&mut self) -> LinkResult<Bytes> {
        match self.pending.take() {
            Some(Reply::Bytes(bytes)) => Ok(bytes),
            Some(Reply::Fail) => {
                self.close();
                Err(LinkError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "scripted failure",
                )))
            }
            Some(Reply::Silence) | None => Ok(Bytes::new()),
        }
    }
}

impl Transport for ScriptedTransport {
    fn open(&mut self) -> BoxFuture<'_, LinkResult<()>> {
        Box::pin(async move {
            if self.open {
                return Ok(());
            }
            let mut state = self.script.lock();
            if state.fail_open {
                return Err(LinkError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "scripted open failure",
                )));
            }
            state.opens += 1;
            drop(state);
            self.open = true;
            Ok(())
        })
    }

    fn close(&mut self) {
        self.open = false;
        self.pending = None;
    }

    fn write(&mut self, data: Bytes) -> BoxFuture<'_, LinkResult<()>> {
        Box::pin(async move {
            if !self.open {
                return Err(LinkError::NotConnected);
            }
            self.script.lock().written.extend_from_slice(&data);
            self.pending = data.last().map(|&request| self.script.next_reply(request));
            Ok(())
        })
    }

    fn read(&mut self, len: usize, timeout: Duration) -> BoxFuture<'_, LinkResult<Bytes>> {
        Box::pin(async move {
            if !self.open {
                return Err(LinkError::NotConnected);
            }
            // the reply is never instant on a real link
            tokio::task::yield_now().await;
            let bytes = self.take_reply()?;
            if bytes.len() < len {
                return Err(LinkError::Timeout {
                    timeout_ms: timeout_ms(timeout),
                    expected: len,
                    got: bytes.len(),
                });
            }
            Ok(bytes.slice(..len))
        })
    }

    fn read_line(&mut self, timeout: Duration) -> BoxFuture<'_, LinkResult<Bytes>> {
        Box::pin(async move {
            if !self.open {
                return Err(LinkError::NotConnected);
            }
            tokio::task::yield_now().await;
            let bytes = self.take_reply()?;
            match bytes.iter().position(|&b| b == b'\n') {
                Some(end) if end < MAX_LINE_LEN => Ok(bytes.slice(..=end)),
                Some(_) => {
                    self.close();
                    Err(LinkError::LineTooLong { max: MAX_LINE_LEN })
                }
                None => Err(LinkError::Timeout {
                    timeout_ms: timeout_ms(timeout),
                    expected: bytes.len() + 1,
                    got: bytes.len(),
                }),
            }
        })
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_reply_selected_by_request_byte() {
        let script = Script::new();
        script.respond(0x00, Reply::byte(0xAA));
        let mut link = ScriptedTransport::new(script.clone());

        link.open().await.unwrap();
        link.write(Bytes::from_static(&[0x00])).await.unwrap();
        let reply = link.read(1, TIMEOUT).await.unwrap();

        assert_eq!(&reply[..], &[0xAA]);
        assert_eq!(script.written(), vec![0x00]);
    }

    #[tokio::test]
    async fn test_silence_times_out_without_closing() {
        let mut link = ScriptedTransport::new(Script::new());
        link.open().await.unwrap();
        link.write(Bytes::from_static(&[0x00])).await.unwrap();

        let err = link.read(1, TIMEOUT).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(link.is_open());
    }

    #[tokio::test]
    async fn test_failure_closes_link() {
        let script = Script::new();
        script.respond(0x11, Reply::Fail);
        let mut link = ScriptedTransport::new(script);
        link.open().await.unwrap();
        link.write(Bytes::from_static(&[0x11])).await.unwrap();

        assert!(matches!(
            link.read(1, TIMEOUT).await.unwrap_err(),
            LinkError::Io(_)
        ));
        assert!(!link.is_open());
    }

    #[tokio::test]
    async fn test_reply_sequence_last_sticks() {
        let script = Script::new();
        script.respond_seq(0x60, [Reply::line("1.0"), Reply::line("2.0")]);
        let mut link = ScriptedTransport::new(script);
        link.open().await.unwrap();

        let mut lines = Vec::new();
        for _ in 0..3 {
            link.write(Bytes::from_static(&[0x60])).await.unwrap();
            lines.push(link.read_line(TIMEOUT).await.unwrap());
        }
        assert_eq!(lines[0], Bytes::from_static(b"1.0\n"));
        assert_eq!(lines[1], Bytes::from_static(b"2.0\n"));
        assert_eq!(lines[2], Bytes::from_static(b"2.0\n"));
    }

    #[tokio::test]
    async fn test_open_is_idempotent_and_can_fail() {
        let script = Script::new();
        let mut link = ScriptedTransport::new(script.clone());
        link.open().await.unwrap();
        link.open().await.unwrap();
        assert_eq!(script.opens(), 1);

        link.close();
        script.fail_open(true);
        assert!(link.open().await.is_err());
        assert!(!link.is_open());
    }
}
