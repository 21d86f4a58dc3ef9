//! Subprocess transport implementation.
//!
//! # Task layout
//!
//! - one reader task owns the child's stdout, frames it with
//!   [`JsonLineCodec`] and routes every line; EOF or a read error fails all
//!   outstanding calls
//! - one task drains stderr into `tracing`
//! - all writes (requests, notifications, replies to peer requests) go
//!   through a single `tokio::sync::Mutex` around the framed stdin, so lines
//!   never interleave and keep program order

use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use mcplink_protocol::{JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use mcplink_transport_traits::{
    CapabilityCallbacks, InboundRouter, MessageSink, Transport, TransportCore, TransportError,
    TransportFuture, TransportResult, TransportState, TransportType,
};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, warn};

use crate::codec::JsonLineCodec;
use crate::config::StdioServerParams;
use crate::env::{LaunchSpec, Platform};

type BoxedAsyncRead = Pin<Box<dyn AsyncRead + Send + 'static>>;
type BoxedAsyncWrite = Pin<Box<dyn AsyncWrite + Send + 'static>>;
type LineWriter = FramedWrite<BoxedAsyncWrite, JsonLineCodec>;
type SharedWriter = Arc<TokioMutex<Option<LineWriter>>>;

/// Where the byte streams come from
enum StreamSource {
    /// Spawn a child process on every connect
    Spawn(StdioServerParams),
    /// Pre-opened streams, usable for one connection
    Raw {
        reader: Option<BoxedAsyncRead>,
        writer: Option<BoxedAsyncWrite>,
    },
}

impl std::fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spawn(params) => f.debug_tuple("Spawn").field(params).finish(),
            Self::Raw { reader, writer } => f
                .debug_struct("Raw")
                .field("reader", &reader.as_ref().map(|_| "<async reader>"))
                .field("writer", &writer.as_ref().map(|_| "<async writer>"))
                .finish(),
        }
    }
}

/// Newline-delimited JSON-RPC over a child process's stdin/stdout.
///
/// # Examples
///
/// ```rust,ignore
/// use mcplink_stdio::{StdioServerParams, StdioTransport};
///
/// let transport = StdioTransport::new(
///     StdioServerParams::new("npx", ["-y", "@modelcontextprotocol/server-everything"]),
/// );
/// transport.connect().await?;
/// ```
pub struct StdioTransport {
    core: Arc<TransportCore>,
    source: Mutex<StreamSource>,
    writer: SharedWriter,
    child: Mutex<Option<Child>>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    stderr_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport")
            .field("state", &self.core.state())
            .field("source", &*self.source.lock())
            .field("pending", &self.core.pending().len())
            .field("writer", &"<FramedWrite>")
            .finish()
    }
}

impl StdioTransport {
    /// Transport that spawns the server described by `params` on connect
    pub fn new(params: StdioServerParams) -> Self {
        let timeouts = params.timeouts;
        Self::with_source(StreamSource::Spawn(params), timeouts)
    }

    /// Transport over already open streams.
    ///
    /// `reader` is what the server writes (its stdout), `writer` is what
    /// the server reads (its stdin). The streams serve a single connection.
    pub fn from_raw<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + 'static,
        W: AsyncWrite + Send + 'static,
    {
        Self::from_raw_with_timeouts(reader, writer, Default::default())
    }

    /// [`StdioTransport::from_raw`] with explicit timeouts
    pub fn from_raw_with_timeouts<R, W>(
        reader: R,
        writer: W,
        timeouts: mcplink_transport_traits::TimeoutConfig,
    ) -> Self
    where
        R: AsyncRead + Send + 'static,
        W: AsyncWrite + Send + 'static,
    {
        Self::with_source(
            StreamSource::Raw {
                reader: Some(Box::pin(reader)),
                writer: Some(Box::pin(writer)),
            },
            timeouts,
        )
    }

    fn with_source(source: StreamSource, timeouts: mcplink_transport_traits::TimeoutConfig) -> Self {
        Self {
            core: Arc::new(TransportCore::new(TransportType::Stdio, timeouts)),
            source: Mutex::new(source),
            writer: Arc::new(TokioMutex::new(None)),
            child: Mutex::new(None),
            reader_task: Mutex::new(None),
            stderr_task: Mutex::new(None),
        }
    }

    /// Number of requests waiting for a response
    pub fn pending_requests(&self) -> usize {
        self.core.pending().len()
    }

    /// Open the byte streams, spawning the child if needed.
    fn open_streams(&self) -> TransportResult<(BoxedAsyncRead, BoxedAsyncWrite)> {
        let mut source = self.source.lock();
        match &mut *source {
            StreamSource::Spawn(params) => {
                let launch = LaunchSpec::resolve(params, Platform::current());
                let mut child = spawn_child(&launch)?;

                let stdin = child.stdin.take().ok_or_else(|| {
                    TransportError::ConnectionFailed("child stdin was not piped".to_string())
                })?;
                let stdout = child.stdout.take().ok_or_else(|| {
                    TransportError::ConnectionFailed("child stdout was not piped".to_string())
                })?;
                if let Some(stderr) = child.stderr.take() {
                    *self.stderr_task.lock() = Some(drain_stderr(stderr, launch.display()));
                }
                debug!(command = %launch.display(), pid = ?child.id(), "Spawned server process");
                *self.child.lock() = Some(child);

                Ok((Box::pin(stdout), Box::pin(stdin)))
            }
            StreamSource::Raw { reader, writer } => {
                let reader = reader.take().ok_or_else(|| {
                    TransportError::ConfigurationError(
                        "Raw reader stream already consumed".to_string(),
                    )
                })?;
                let writer = writer.take().ok_or_else(|| {
                    TransportError::ConfigurationError(
                        "Raw writer stream already consumed".to_string(),
                    )
                })?;
                Ok((reader, writer))
            }
        }
    }

    async fn start(&self) -> TransportResult<()> {
        let (reader, writer) = self.open_streams()?;
        *self.writer.lock().await = Some(FramedWrite::new(writer, JsonLineCodec::new()));

        let router = self.core.router(Arc::new(StdinSink {
            writer: Arc::clone(&self.writer),
        }));
        *self.reader_task.lock() = Some(spawn_reader(reader, router, Arc::clone(&self.core)));
        Ok(())
    }

    /// Stop the tasks, close stdin and reap the child.
    ///
    /// Never waits on a write the child is not draining: if the writer lock
    /// stays held past the grace period, or a line was abandoned half
    /// written, the child is killed instead of being asked to exit.
    async fn teardown(&self) {
        if let Some(handle) = self.reader_task.lock().take() {
            handle.abort();
        }
        let grace = self.core.timeouts().shutdown;

        let writer = match tokio::time::timeout(grace, self.writer.lock()).await {
            Ok(mut guard) => guard.take(),
            Err(_) => {
                warn!(?grace, "Server stdin is blocked; killing server process");
                self.kill_child();
                self.writer.lock().await.take()
            }
        };
        if let Some(mut writer) = writer {
            if writer.write_buffer().is_empty() {
                match tokio::time::timeout(grace, SinkExt::<String>::close(&mut writer)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => debug!(error = %e, "Closing server stdin failed"),
                    Err(_) => self.kill_child(),
                }
            } else {
                debug!("Dropping partially written line; killing server process");
                self.kill_child();
            }
        }

        let child = self.child.lock().take();
        if let Some(mut child) = child {
            reap(&mut child, grace).await;
        }

        if let Some(handle) = self.stderr_task.lock().take() {
            handle.abort();
        }
    }

    fn kill_child(&self) {
        if let Some(child) = self.child.lock().as_mut()
            && let Err(e) = child.start_kill()
        {
            warn!(error = %e, "Failed to kill server process");
        }
    }
}

fn spawn_child(launch: &LaunchSpec) -> TransportResult<Child> {
    let mut command = Command::new(&launch.program);
    command
        .args(&launch.args)
        .env_clear()
        .envs(&launch.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &launch.cwd {
        command.current_dir(cwd);
    }
    // Keep terminal signals aimed at the client away from the server.
    #[cfg(unix)]
    command.process_group(0);

    command.spawn().map_err(|e| {
        TransportError::ConnectionFailed(format!("failed to spawn '{}': {e}", launch.display()))
    })
}

fn spawn_reader(
    reader: BoxedAsyncRead,
    router: InboundRouter,
    core: Arc<TransportCore>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = FramedRead::new(reader, JsonLineCodec::new());
        let reason = loop {
            match lines.next().await {
                Some(Ok(line)) => {
                    router.route_text(&line);
                }
                Some(Err(e)) => {
                    error!(error = %e, "Failed to read from server stdout");
                    break format!("read from server failed: {e}");
                }
                None => break "server closed its stdout".to_string(),
            }
        };
        debug!(%reason, "Stdio reader task completed");
        core.connection_lost(&reason);
    })
}

fn drain_stderr(stderr: ChildStderr, command: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = FramedRead::new(stderr, JsonLineCodec::new());
        while let Some(Ok(line)) = lines.next().await {
            debug!(target: "mcplink_stdio::server_stderr", server = %command, "{line}");
        }
    })
}

/// Wait up to `grace` for the child to exit on its own, then kill it.
async fn reap(child: &mut Child, grace: Duration) {
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => debug!(%status, "Server process exited"),
        Ok(Err(e)) => warn!(error = %e, "Failed to wait for server process"),
        Err(_) => {
            warn!(?grace, "Server process did not exit in time; killing it");
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill server process");
            }
        }
    }
}

async fn write_line(writer: &TokioMutex<Option<LineWriter>>, line: String) -> TransportResult<()> {
    let mut guard = writer.lock().await;
    let Some(framed) = guard.as_mut() else {
        return Err(TransportError::ConnectionClosed(
            "server stdin is closed".to_string(),
        ));
    };
    framed.send(line).await.map_err(|e| match e {
        TransportError::Io(message) => TransportError::SendFailed(message),
        other => other,
    })
}

/// Writes replies to peer requests on the same stdin
struct StdinSink {
    writer: SharedWriter,
}

impl std::fmt::Debug for StdinSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdinSink").finish_non_exhaustive()
    }
}

impl MessageSink for StdinSink {
    fn deliver(&self, message: JsonRpcMessage) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let line = serde_json::to_string(&message)?;
            write_line(&self.writer, line).await
        })
    }
}

impl Transport for StdioTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Stdio
    }

    fn state(&self) -> TransportState {
        self.core.state()
    }

    fn attach_callbacks(&self, callbacks: CapabilityCallbacks) -> TransportResult<()> {
        self.core.attach_callbacks(callbacks)
    }

    fn callbacks(&self) -> CapabilityCallbacks {
        self.core.callbacks()
    }

    fn connect(&self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.core.begin_connect()?;
            match self.start().await.and_then(|()| self.core.finish_connect()) {
                Ok(()) => {
                    debug!("Stdio transport connected");
                    Ok(())
                }
                Err(e) => {
                    error!(error = %e, "Failed to connect stdio transport");
                    self.teardown().await;
                    self.core.pending().cancel_all(e.to_string());
                    self.core.set_state(TransportState::Failed {
                        reason: e.to_string(),
                    });
                    Err(e)
                }
            }
        })
    }

    fn disconnect(&self) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            self.core.begin_disconnect();
            self.teardown().await;
            self.core.finish_disconnect();
            debug!("Stdio transport disconnected");
            Ok(())
        })
    }

    fn send_request(&self, request: JsonRpcRequest) -> TransportFuture<'_, JsonRpcResponse> {
        Box::pin(async move {
            let writer = &self.writer;
            self.core
                .request(request, |line| write_line(writer, line))
                .await
        })
    }

    fn send_notification(&self, notification: JsonRpcNotification) -> TransportFuture<'_, ()> {
        Box::pin(async move {
            let line = self.core.notification_wire(&notification)?;
            write_line(&self.writer, line).await.map_err(|e| match e {
                TransportError::ConnectionClosed(reason) => TransportError::Unavailable(reason),
                other => other,
            })
        })
    }

    fn endpoint(&self) -> Option<String> {
        match &*self.source.lock() {
            StreamSource::Spawn(params) => {
                Some(LaunchSpec::resolve(params, Platform::current()).display())
            }
            StreamSource::Raw { .. } => None,
        }
    }
}
