//! The expect engine: one transport, one buffer, one suspension point.
//!
//! `send` writes a command at the device; `expect` polls the transport on a
//! fixed interval, accumulating output until a predicate holds or a wait
//! budget runs out. Everything higher up composes from these two calls plus
//! `drain_once` for the short fixed-settle exchanges.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, trace};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Notify;
use tokio::time::Instant;

use super::buffer::LineBuffer;
use super::patterns::BufferPredicate;
use crate::error::{ExpectError, Result};
use crate::transport::Transport;

/// Carriage return, the line terminator the device CLIs expect.
const LINE_TERMINATOR: &str = "\r";

/// Cancellation handle for in-flight waits.
///
/// Cloning yields another handle onto the same flag. Cancelling aborts the
/// current (and any future) poll wait on sessions carrying the token, which
/// then fail with [`ExpectError::Cancelled`]. This is the only escape hatch
/// from the deliberately unbounded long-operation waits, so long-lived
/// services should keep a handle per session.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once the token is cancelled.
    pub(crate) async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// One logical console exchange endpoint: a transport plus its buffer.
///
/// Owns retry-free timeout policy for a single exchange. The accumulated
/// buffer is reset every time an `expect` is satisfied, so no residual text
/// leaks into the next predicate evaluation; bytes the device sends after
/// the satisfying read stay queued in the transport and surface in the next
/// exchange.
pub struct ExpectSession {
    transport: Box<dyn Transport>,
    buffer: LineBuffer,
    cancel: CancelToken,
}

impl ExpectSession {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            buffer: LineBuffer::new(),
            cancel: CancelToken::new(),
        }
    }

    /// The physical port identifier.
    pub fn port(&self) -> &str {
        self.transport.identifier()
    }

    /// A cancellation handle for this session's waits.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Replace the session's cancellation token (e.g. to share one token
    /// across a fleet).
    pub fn set_cancel_token(&mut self, token: CancelToken) {
        self.cancel = token;
    }

    /// A read-only view of the accumulated buffer.
    pub fn buffer(&self) -> &LineBuffer {
        &self.buffer
    }

    /// Write `text` followed by a carriage return.
    ///
    /// No response is read here; issuing a command and collecting its
    /// output are separate calls.
    pub async fn send(&mut self, text: &str) -> Result<()> {
        debug!("{}: send {:?}", self.port(), text);
        self.write_line(text).await
    }

    /// Write a secret followed by a carriage return, without logging it.
    pub async fn send_secret(&mut self, secret: &SecretString) -> Result<()> {
        debug!("{}: send <hidden>", self.port());
        self.write_line(secret.expose_secret()).await
    }

    /// Write exactly `text`, no terminator appended.
    pub async fn send_raw(&mut self, text: &str) -> Result<()> {
        debug!("{}: send raw {:?}", self.port(), text);
        self.transport.write(text.as_bytes()).await?;
        Ok(())
    }

    async fn write_line(&mut self, text: &str) -> Result<()> {
        let mut line = String::with_capacity(text.len() + LINE_TERMINATOR.len());
        line.push_str(text);
        line.push_str(LINE_TERMINATOR);
        self.transport.write(line.as_bytes()).await?;
        Ok(())
    }

    /// Poll until `predicate` holds on the accumulated buffer.
    ///
    /// Each cycle sleeps `poll`, reads everything currently available, and
    /// re-evaluates. On success the accumulated text is returned and the
    /// buffer reset. `timeout == None` waits forever (the behavior the
    /// long-running device operations rely on); with a budget, failure
    /// arrives within `timeout` plus at most one poll interval, carrying
    /// whatever was accumulated for diagnostics.
    ///
    /// The engine never re-sends anything on its own: deciding whether
    /// "no output yet" means "still working" or "needs a nudge" takes
    /// knowledge of the command semantics, which only the caller has.
    pub async fn expect(
        &mut self,
        predicate: &dyn BufferPredicate,
        timeout: Option<Duration>,
        poll: Duration,
    ) -> Result<String> {
        let start = Instant::now();
        loop {
            self.pause(poll, predicate, start).await?;

            let appended = self.read_available().await?;
            if appended > 0 {
                trace!(
                    "{}: +{} bytes, buffer {:?}",
                    self.port(),
                    appended,
                    self.buffer.normalized()
                );
            }

            if predicate.matches(&self.buffer) {
                debug!(
                    "{}: matched {} after {:?}",
                    self.port(),
                    predicate.describe(),
                    start.elapsed()
                );
                return Ok(self.buffer.take());
            }

            if let Some(budget) = timeout {
                if start.elapsed() >= budget {
                    return Err(ExpectError::Timeout {
                        expecting: predicate.describe(),
                        waited: start.elapsed(),
                        accumulated: self.buffer.take(),
                    }
                    .into());
                }
            }
        }
    }

    /// One fixed settle: sleep, read whatever arrived, return it.
    ///
    /// The short deterministic exchanges (prompt probes, command echoes)
    /// settle on a fixed interval instead of polling for a predicate, and
    /// legitimately may return nothing at all.
    pub async fn drain_once(&mut self, settle: Duration) -> Result<String> {
        struct Anything;
        impl BufferPredicate for Anything {
            fn matches(&self, _: &LineBuffer) -> bool {
                true
            }
            fn describe(&self) -> String {
                "a settle interval".to_string()
            }
        }

        let start = Instant::now();
        self.pause(settle, &Anything, start).await?;
        self.read_available().await?;
        Ok(self.buffer.take())
    }

    /// Cancellation-aware sleep.
    async fn pause(
        &mut self,
        interval: Duration,
        predicate: &dyn BufferPredicate,
        start: Instant,
    ) -> Result<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ExpectError::Cancelled {
                expecting: predicate.describe(),
                waited: start.elapsed(),
                accumulated: self.buffer.take(),
            }
            .into()),
            _ = tokio::time::sleep(interval) => Ok(()),
        }
    }

    /// Read all currently available bytes into the buffer.
    async fn read_available(&mut self) -> Result<usize> {
        let mut appended = 0;
        loop {
            let available = self.transport.bytes_available().await?;
            if available == 0 {
                return Ok(appended);
            }
            let chunk = self.transport.read(available).await?;
            if chunk.is_empty() {
                return Ok(appended);
            }
            appended += chunk.len();
            self.buffer.append(&chunk);
        }
    }

    /// Close the underlying transport.
    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::patterns::{Contains, EndsWith};
    use crate::error::Error;
    use crate::transport::mock::{MockTransport, Rule};

    fn session(rules: Vec<Rule>) -> (ExpectSession, crate::transport::mock::MockHandle) {
        let (transport, handle) = MockTransport::scripted("mock0", rules);
        (ExpectSession::new(Box::new(transport)), handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_appends_carriage_return() {
        let (mut session, handle) = session(vec![]);
        session.send("enable").await.unwrap();
        assert_eq!(handle.writes(), vec!["enable\r".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expect_matches_accumulated_chunks() {
        let (mut session, _handle) = session(vec![Rule::on_chunks(
            "show version",
            &["IOS Software, ", "version 15.6\r\n", "Router#"],
        )]);

        session.send("show version").await.unwrap();
        let out = session
            .expect(
                &EndsWith("#"),
                Some(Duration::from_secs(30)),
                Duration::from_secs(1),
            )
            .await
            .unwrap();

        assert!(out.contains("version 15.6"));
        assert!(out.ends_with("Router#"));
        assert!(session.buffer().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expect_timeout_returns_accumulated() {
        let (mut session, _handle) = session(vec![Rule::on("copy", "partial output, no prompt")]);

        session.send("copy tftp flash").await.unwrap();
        let err = session
            .expect(
                &EndsWith("#"),
                Some(Duration::from_secs(5)),
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();

        match err {
            Error::Expect(ExpectError::Timeout {
                waited,
                accumulated,
                ..
            }) => {
                assert!(accumulated.contains("partial output"));
                // bounded by timeout plus at most one poll interval
                assert!(waited >= Duration::from_secs(5));
                assert!(waited <= Duration::from_secs(6));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_expect_does_not_hang_without_input() {
        let (mut session, _handle) = session(vec![]);
        let err = session
            .expect(
                &Contains("never"),
                Some(Duration::from_secs(3)),
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Expect(ExpectError::Timeout { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_leak_between_exchanges() {
        let (mut session, handle) = session(vec![Rule::on("first", "one\r\nRouter#")]);

        session.send("first").await.unwrap();
        let first = session
            .expect(
                &EndsWith("#"),
                Some(Duration::from_secs(10)),
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert!(first.contains("one"));

        // The next exchange starts from an empty buffer.
        handle.push_chunk("two\r\nRouter#");
        let second = session
            .expect(
                &EndsWith("#"),
                Some(Duration::from_secs(10)),
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert!(!second.contains("one"));
        assert!(second.contains("two"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_poll() {
        let (mut session, _handle) = session(vec![]);
        let token = session.cancel_token();

        let waiter = async {
            session
                .expect(&Contains("never"), None, Duration::from_secs(10))
                .await
        };
        let canceller = async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            token.cancel();
        };

        let (result, ()) = tokio::join!(waiter, canceller);
        assert!(matches!(
            result.unwrap_err(),
            Error::Expect(ExpectError::Cancelled { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_once_returns_whatever_arrived() {
        let (mut session, handle) = session(vec![]);
        handle.push_chunk("Router#");
        let out = session.drain_once(Duration::from_secs(1)).await.unwrap();
        assert_eq!(out, "Router#");

        // and nothing at all is a legitimate result
        let out = session.drain_once(Duration::from_secs(1)).await.unwrap();
        assert!(out.is_empty());
    }
}
