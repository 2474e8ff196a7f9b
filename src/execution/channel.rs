//! Request/reply channel to the long-lived Python worker.
//!
//! A single actor task owns the child process. Callers send it commands over an
//! unbounded channel and wait on a oneshot for the matching reply, so nothing
//! outside the actor ever touches the pipes.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::protocol::{Envelope, Reply, Request};
use super::{joined_text, CompileOutcome, ExecutionResult, Kernel, OutputChunk};
use crate::error::{Result, WorkerError};
use crate::process::{self, InterpreterSpec, ProcessHandle};

/// How long a shutdown request may take before the worker is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

enum Command {
    Call {
        request: Request,
        reply: oneshot::Sender<Reply>,
    },
    Restart {
        done: oneshot::Sender<Result<()>>,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Cloneable handle to the worker actor.
#[derive(Clone)]
pub struct WorkerChannel {
    commands: mpsc::UnboundedSender<Command>,
    alive: Arc<AtomicBool>,
    interactive_timeout: Duration,
}

impl WorkerChannel {
    /// Start the worker process and the actor that drives it.
    pub async fn spawn(spec: InterpreterSpec, interactive_timeout: Duration) -> Result<Self> {
        let handle = process::start(&spec).await?;
        let alive = Arc::new(AtomicBool::new(true));
        let (commands, receiver) = mpsc::unbounded_channel();

        let actor = WorkerActor::new(spec, handle, alive.clone());
        tokio::spawn(actor.run(receiver));

        Ok(Self {
            commands,
            alive,
            interactive_timeout,
        })
    }

    /// Whether the worker is believed to be able to answer.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Send `request` and wait for its reply.
    ///
    /// With a `timeout`, expiry yields [`WorkerError::Timeout`] and leaves the
    /// worker marked alive; a reply that arrives later is dropped.
    pub async fn call(&self, request: Request, timeout: Option<Duration>) -> Result<Reply> {
        if !self.is_alive() {
            return Err(WorkerError::NotAlive);
        }
        let (reply, answer) = oneshot::channel();
        self.commands
            .send(Command::Call { request, reply })
            .map_err(|_| WorkerError::NotAlive)?;

        let reply = match timeout {
            Some(limit) => tokio::time::timeout(limit, answer)
                .await
                .map_err(|_| WorkerError::Timeout(limit))?,
            None => answer.await,
        };
        match reply.map_err(|_| WorkerError::NoAnswer)? {
            Reply::Failed { message } => Err(WorkerError::Worker(message)),
            reply => Ok(reply),
        }
    }

    /// Collect output printed since the last flush.
    pub async fn flush(&self) -> Result<Vec<OutputChunk>> {
        match self.call(Request::Flush, Some(self.interactive_timeout)).await? {
            Reply::Flushed { output } => Ok(output),
            other => Err(unexpected("flush", &other)),
        }
    }

    /// Kill the worker and start a fresh one. The namespace is lost and any
    /// call in flight gets [`WorkerError::NoAnswer`].
    pub async fn restart(&self) -> Result<()> {
        let (done, finished) = oneshot::channel();
        self.commands
            .send(Command::Restart { done })
            .map_err(|_| WorkerError::NotAlive)?;
        finished.await.map_err(|_| WorkerError::NoAnswer)?
    }

    /// Ask the worker to exit and wait for the actor to stop.
    pub async fn shutdown(&self) {
        let (done, finished) = oneshot::channel();
        if self.commands.send(Command::Shutdown { done }).is_ok() {
            let _ = finished.await;
        }
    }
}

fn unexpected(operation: &str, reply: &Reply) -> WorkerError {
    WorkerError::Protocol(format!("unexpected reply to {operation}: {reply:?}"))
}

fn execution_result(operation: &str, reply: Reply) -> Result<ExecutionResult> {
    match reply {
        Reply::Evaluated { repr: Some(repr), output } => Ok(ExecutionResult::Value(joined_text(&output) + &repr)),
        Reply::Evaluated { repr: None, output } | Reply::Executed { output } => Ok(ExecutionResult::Success(output)),
        Reply::Raised { output } => Ok(ExecutionResult::RuntimeError(output)),
        Reply::SyntaxError { output } => Ok(ExecutionResult::SyntaxError(output)),
        Reply::Incomplete => Ok(ExecutionResult::Incomplete),
        other => Err(unexpected(operation, &other)),
    }
}

impl Kernel for WorkerChannel {
    async fn try_compile(&self, line_offset: usize, filename: &str, source: &str) -> Result<CompileOutcome> {
        let request = Request::TryCompile {
            line_offset,
            filename: filename.to_string(),
            source: source.to_string(),
        };
        match self.call(request, Some(self.interactive_timeout)).await? {
            Reply::Compiled { is_value: true } => Ok(CompileOutcome::Expression),
            Reply::Compiled { is_value: false } => Ok(CompileOutcome::Statements),
            Reply::Incomplete => Ok(CompileOutcome::Incomplete),
            Reply::SyntaxError { output } => Ok(CompileOutcome::SyntaxError(output)),
            other => Err(unexpected("try_compile", &other)),
        }
    }

    async fn evaluate(&self) -> Result<ExecutionResult> {
        let reply = self.call(Request::Evaluate, None).await?;
        execution_result("evaluate", reply)
    }

    async fn execute(&self) -> Result<ExecutionResult> {
        let reply = self.call(Request::Execute, None).await?;
        execution_result("execute", reply)
    }

    async fn execute_source(&self, line_offset: usize, filename: &str, source: &str) -> Result<ExecutionResult> {
        let request = Request::ExecuteSource {
            line_offset,
            filename: filename.to_string(),
            source: source.to_string(),
        };
        let reply = self.call(request, None).await?;
        execution_result("execute_source", reply)
    }

    async fn set_working_dir(&self, path: &Path) -> Result<()> {
        let request = Request::SetWorkingDir {
            path: path.to_string_lossy().into_owned(),
        };
        match self.call(request, Some(self.interactive_timeout)).await? {
            Reply::Ack => Ok(()),
            other => Err(unexpected("set_working_dir", &other)),
        }
    }
}

/// Owns the child process and pairs replies with waiting callers.
struct WorkerActor {
    spec: InterpreterSpec,
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    alive: Arc<AtomicBool>,
    pending: HashMap<u64, oneshot::Sender<Reply>>,
    next_id: u64,
    reading: bool,
}

impl WorkerActor {
    fn new(spec: InterpreterSpec, handle: ProcessHandle, alive: Arc<AtomicBool>) -> Self {
        let (child, stdin, stdout) = attach(handle);
        Self {
            spec,
            child,
            stdin,
            stdout,
            alive,
            pending: HashMap::new(),
            next_id: 1,
            reading: true,
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Call { request, reply }) => self.send(request, reply).await,
                    Some(Command::Restart { done }) => {
                        let _ = done.send(self.restart().await);
                    }
                    Some(Command::Shutdown { done }) => {
                        self.stop().await;
                        let _ = done.send(());
                        break;
                    }
                    None => {
                        self.stop().await;
                        break;
                    }
                },
                line = self.stdout.next_line(), if self.reading => match line {
                    Ok(Some(line)) => self.dispatch(&line),
                    Ok(None) => self.lost("worker closed its output"),
                    Err(err) => self.lost(&format!("reading worker output failed: {err}")),
                },
            }
        }
    }

    async fn send(&mut self, request: Request, reply: oneshot::Sender<Reply>) {
        if !self.alive.load(Ordering::SeqCst) {
            // Dropping `reply` tells the caller there is no answer.
            return;
        }
        let id = self.next_id;
        self.next_id += 1;
        let operation = request.name();
        let line = match (Envelope { id, body: request }).to_line() {
            Ok(line) => line,
            Err(err) => {
                warn!(%err, operation, "could not encode request");
                return;
            }
        };
        self.pending.insert(id, reply);
        debug!(id, operation, "-> worker");
        if let Err(err) = write_line(&mut self.stdin, &line).await {
            self.lost(&format!("writing to worker failed: {err}"));
        }
    }

    fn dispatch(&mut self, line: &str) {
        let envelope: Envelope<Reply> = match serde_json::from_str(line) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%err, line, "ignoring malformed worker line");
                return;
            }
        };
        debug!(id = envelope.id, "<- worker");
        match self.pending.remove(&envelope.id) {
            Some(waiter) => {
                let _ = waiter.send(envelope.body);
            }
            None => debug!(id = envelope.id, "reply arrived after its caller gave up"),
        }
    }

    /// Mark the worker dead and fail every caller still waiting.
    fn lost(&mut self, reason: &str) {
        if self.alive.load(Ordering::SeqCst) {
            warn!(reason, "Python kernel not responding");
        }
        self.detach();
    }

    fn detach(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        self.reading = false;
        self.pending.clear();
    }

    async fn kill(&mut self) {
        if let Err(err) = self.child.kill().await {
            debug!(%err, "worker already gone");
        }
    }

    async fn restart(&mut self) -> Result<()> {
        self.detach();
        self.kill().await;
        let handle = process::start(&self.spec).await?;
        (self.child, self.stdin, self.stdout) = attach(handle);
        self.reading = true;
        self.alive.store(true, Ordering::SeqCst);
        info!(program = %self.spec.program, "python worker restarted");
        Ok(())
    }

    async fn stop(&mut self) {
        if self.alive.load(Ordering::SeqCst) {
            if let Ok(line) = (Envelope { id: 0, body: Request::Shutdown }).to_line() {
                let _ = write_line(&mut self.stdin, &line).await;
            }
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait()).await;
        }
        self.detach();
        self.kill().await;
    }
}

async fn write_line(stdin: &mut ChildStdin, line: &str) -> std::io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await
}

/// Split a fresh process into the parts the actor drives. Stderr is forwarded
/// to the log.
fn attach(handle: ProcessHandle) -> (Child, ChildStdin, Lines<BufReader<ChildStdout>>) {
    let ProcessHandle {
        child,
        stdin,
        stdout,
        stderr,
    } = handle;
    if let Some(stderr) = stderr {
        tokio::spawn(forward_stderr(stderr));
    }
    (child, stdin, BufReader::new(stdout).lines())
}

async fn forward_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        warn!(target: "pypad::worker", "{line}");
    }
}
