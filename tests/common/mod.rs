//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};

use axum::http::{Method, Uri};
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use httpserv::fcgi::params;
use httpserv::fcgi::record::BeginRequest;
use httpserv::fcgi::{Record, RecordCodec, RecordType};
use httpserv::lifecycle::ShutdownSignal;
use httpserv::net::LocalAddr;
use httpserv::{ServeError, Server, ServerConfig};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

/// Log output captured from a thread-local subscriber.
#[derive(Clone, Default)]
pub struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Capture everything logged on this thread until the guard is dropped.
///
/// Tests using this must run on the current-thread runtime so spawned
/// tasks log on the same thread.
pub fn capture_logs() -> (Captured, tracing::subscriber::DefaultGuard) {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    (captured, tracing::subscriber::set_default(subscriber))
}

/// Handler answering `"{method} {uri}\n{body}"` for every request.
pub fn echo_app() -> Router {
    Router::new().fallback(|method: Method, uri: Uri, body: String| async move {
        format!("{method} {uri}\n{body}")
    })
}

pub fn config(socket: &str, addr: &str, proto: &str) -> ServerConfig {
    ServerConfig {
        socket: socket.into(),
        addr: addr.into(),
        proto: proto.into(),
        ..Default::default()
    }
}

/// A server serving [`echo_app`] in a background task.
pub struct Running {
    pub addr: LocalAddr,
    signal: oneshot::Sender<ShutdownSignal>,
    task: JoinHandle<Result<ShutdownSignal, ServeError>>,
}

impl Running {
    /// Deliver `signal` and wait for the server to close its listener.
    pub async fn stop(self, signal: ShutdownSignal) -> Result<ShutdownSignal, ServeError> {
        let _ = self.signal.send(signal);
        self.task.await.unwrap()
    }
}

pub async fn start(config: ServerConfig) -> Running {
    let server = Server::new(config, echo_app())
        .start()
        .await
        .expect("server should start");
    let addr = server.local_addr().unwrap();
    let (signal, received) = oneshot::channel();
    let task = tokio::spawn(server.serve_until(async move {
        received.await.unwrap_or(ShutdownSignal::Terminate)
    }));
    Running { addr, signal, task }
}

/// Response to one FastCGI request.
#[derive(Debug, Default)]
pub struct FcgiReply {
    pub stdout: String,
    pub stderr: String,
    pub protocol_status: u8,
}

/// Run one FastCGI responder request with the given params and body.
pub async fn fcgi_request<IO>(io: IO, params: &[(&str, &str)], body: &[u8]) -> FcgiReply
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    const ID: u16 = 1;
    let mut framed = Framed::new(io, RecordCodec);

    let begin = BeginRequest {
        role: BeginRequest::RESPONDER,
        flags: 0,
    };
    framed
        .send(Record::new(RecordType::BeginRequest, ID, begin.encode()))
        .await
        .unwrap();
    framed
        .send(Record::new(RecordType::Params, ID, params::encode(params.iter().copied())))
        .await
        .unwrap();
    framed.send(Record::new(RecordType::Params, ID, "")).await.unwrap();
    if !body.is_empty() {
        framed
            .send(Record::new(RecordType::Stdin, ID, body.to_vec()))
            .await
            .unwrap();
    }
    framed.send(Record::new(RecordType::Stdin, ID, "")).await.unwrap();

    let mut reply = FcgiReply::default();
    while let Some(record) = framed.next().await {
        let record = record.unwrap();
        match record.record_type {
            RecordType::Stdout => reply.stdout.push_str(&String::from_utf8_lossy(&record.content)),
            RecordType::Stderr => reply.stderr.push_str(&String::from_utf8_lossy(&record.content)),
            RecordType::EndRequest => {
                reply.protocol_status = record.content[4];
                break;
            }
            other => panic!("unexpected record type {other:?}"),
        }
    }
    reply
}
