//! FastCGI responder connections.
//!
//! # Responsibilities
//! - Read records and track in-flight requests by id
//! - Start the handler on the first `FCGI_STDIN` record, streaming the rest
//!   of stdin into the request body
//! - Serialise every outgoing record through a single writer task
//! - Answer management records (`FCGI_GET_VALUES`, unknown types)
//!
//! # Design Decisions
//! - Requests on one connection run concurrently (`FCGI_MPXS_CONNS=1`)
//! - The connection is closed when its read side ends, when a request
//!   without `FCGI_KEEP_CONN` completes or is aborted, or on a protocol error
//! - Stdin is forwarded through a small bounded channel per request; a
//!   handler that stops reading its body while still running holds up the
//!   reading of records for every request on the connection

use std::collections::HashMap;
use std::io;
use std::ops::ControlFlow;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use futures_util::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use crate::fcgi::codec::RecordCodec;
use crate::fcgi::params;
use crate::fcgi::record::{BeginRequest, ProtocolStatus, Record, RecordType, MANAGEMENT_ID};
use crate::fcgi::request::{build_request, response_head, RequestError};
use crate::http::RequestHandler;

const OUTGOING_CAPACITY: usize = 32;
const BODY_CAPACITY: usize = 8;

/// Values reported in answer to `FCGI_GET_VALUES`.
const MANAGEMENT_VALUES: &[(&str, &str)] = &[("FCGI_MPXS_CONNS", "1")];

enum Outgoing {
    Record(Record),
    Close,
}

struct InFlight {
    keep_conn: bool,
    raw_params: BytesMut,
    started: bool,
    body_tx: Option<mpsc::Sender<io::Result<Bytes>>>,
}

impl InFlight {
    fn new(keep_conn: bool) -> Self {
        Self {
            keep_conn,
            raw_params: BytesMut::new(),
            started: false,
            body_tx: None,
        }
    }

    fn abort_body(&self, reason: &'static str) {
        if let Some(tx) = &self.body_tx {
            let _ = tx.try_send(Err(io::Error::new(io::ErrorKind::ConnectionAborted, reason)));
        }
    }
}

/// Serve FastCGI on one connection until it is closed.
pub async fn serve_connection<IO, H>(io: IO, handler: H)
where
    IO: AsyncRead + AsyncWrite + Send + 'static,
    H: RequestHandler,
{
    let (read_half, write_half) = tokio::io::split(io);
    let closed = CancellationToken::new();
    let (out, out_rx) = mpsc::channel(OUTGOING_CAPACITY);
    let writer = tokio::spawn(write_records(
        FramedWrite::new(write_half, RecordCodec),
        out_rx,
        closed.clone(),
    ));

    let mut responder = Responder {
        requests: HashMap::new(),
        out,
        handler,
    };
    let mut records = FramedRead::new(read_half, RecordCodec);

    loop {
        let record = tokio::select! {
            _ = closed.cancelled() => break,
            next = records.next() => match next {
                Some(Ok(record)) => record,
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "FastCGI read failed");
                    break;
                }
                None => break,
            },
        };
        if responder.handle(record).await.is_break() {
            break;
        }
    }

    for request in responder.requests.values() {
        request.abort_body("FastCGI connection closed");
    }
    let _ = responder.out.send(Outgoing::Close).await;
    drop(responder);
    let _ = writer.await;
}

struct Responder<H> {
    requests: HashMap<u16, InFlight>,
    out: mpsc::Sender<Outgoing>,
    handler: H,
}

impl<H: RequestHandler> Responder<H> {
    async fn handle(&mut self, record: Record) -> ControlFlow<()> {
        let id = record.request_id;
        match record.record_type {
            RecordType::BeginRequest => self.begin(id, &record.content).await,
            RecordType::GetValues => self.get_values(&record.content).await,
            RecordType::Params => {
                if let Some(request) = self.requests.get_mut(&id) {
                    request.raw_params.extend_from_slice(&record.content);
                }
                ControlFlow::Continue(())
            }
            RecordType::Stdin => self.stdin(id, record.content).await,
            RecordType::AbortRequest => self.abort(id).await,
            other => {
                if id == MANAGEMENT_ID || self.requests.contains_key(&id) {
                    self.send(Record::unknown_type(other.into())).await;
                }
                ControlFlow::Continue(())
            }
        }
    }

    async fn begin(&mut self, id: u16, content: &[u8]) -> ControlFlow<()> {
        if self.requests.contains_key(&id) {
            tracing::debug!(request_id = id, "FastCGI request id already in flight");
            return ControlFlow::Break(());
        }
        let begin = match BeginRequest::parse(content) {
            Ok(begin) => begin,
            Err(e) => {
                tracing::debug!(request_id = id, error = %e, "Bad FastCGI begin record");
                return ControlFlow::Break(());
            }
        };
        if begin.role != BeginRequest::RESPONDER {
            self.send(Record::end_request(id, 0, ProtocolStatus::UnknownRole))
                .await;
            return ControlFlow::Continue(());
        }
        self.requests.insert(id, InFlight::new(begin.keep_conn()));
        ControlFlow::Continue(())
    }

    async fn get_values(&mut self, content: &[u8]) -> ControlFlow<()> {
        let asked = match params::decode(content) {
            Ok(asked) => asked,
            Err(e) => {
                tracing::debug!(error = %e, "Bad FastCGI get-values record");
                return ControlFlow::Continue(());
            }
        };
        let values = MANAGEMENT_VALUES
            .iter()
            .filter(|(name, _)| asked.contains_key(*name))
            .copied();
        self.send(Record::new(
            RecordType::GetValuesResult,
            MANAGEMENT_ID,
            params::encode(values),
        ))
        .await;
        ControlFlow::Continue(())
    }

    async fn stdin(&mut self, id: u16, content: Bytes) -> ControlFlow<()> {
        let Some(request) = self.requests.get_mut(&id) else {
            return ControlFlow::Continue(());
        };

        if !request.started {
            request.started = true;
            let body = if content.is_empty() {
                Body::empty()
            } else {
                let (tx, rx) = mpsc::channel(BODY_CAPACITY);
                request.body_tx = Some(tx);
                channel_body(rx)
            };
            let http_request = params::decode(&request.raw_params)
                .map_err(RequestError::from)
                .and_then(|params| build_request(&params, body));
            tokio::spawn(serve_request(
                id,
                request.keep_conn,
                http_request,
                self.handler.clone(),
                self.out.clone(),
            ));
        }

        if content.is_empty() {
            // end of stdin; dropping the sender ends the body stream
            self.requests.remove(&id);
        } else if let Some(tx) = &request.body_tx {
            let _ = tx.send(Ok(content)).await;
        }
        ControlFlow::Continue(())
    }

    async fn abort(&mut self, id: u16) -> ControlFlow<()> {
        let Some(request) = self.requests.remove(&id) else {
            return ControlFlow::Continue(());
        };
        self.send(Record::end_request(id, 0, ProtocolStatus::RequestComplete))
            .await;
        request.abort_body("FastCGI request aborted");
        if request.keep_conn {
            ControlFlow::Continue(())
        } else {
            ControlFlow::Break(())
        }
    }

    async fn send(&self, record: Record) {
        let _ = self.out.send(Outgoing::Record(record)).await;
    }
}

fn channel_body(mut rx: mpsc::Receiver<io::Result<Bytes>>) -> Body {
    Body::from_stream(futures_util::stream::poll_fn(move |cx| rx.poll_recv(cx)))
}

async fn serve_request<H: RequestHandler>(
    id: u16,
    keep_conn: bool,
    request: Result<Request<Body>, RequestError>,
    handler: H,
    out: mpsc::Sender<Outgoing>,
) {
    let response = match request {
        Ok(request) => handler
            .oneshot(request)
            .await
            .unwrap_or_else(|never| match never {}),
        Err(e) => {
            tracing::warn!(request_id = id, error = %e, "Rejecting FastCGI request");
            let _ = out
                .send(Outgoing::Record(Record::new(RecordType::Stderr, id, e.to_string())))
                .await;
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    };

    if write_response(id, response, &out).await.is_err() {
        return;
    }
    let _ = out
        .send(Outgoing::Record(Record::end_request(
            id,
            0,
            ProtocolStatus::RequestComplete,
        )))
        .await;
    if !keep_conn {
        let _ = out.send(Outgoing::Close).await;
    }
}

async fn write_response(
    id: u16,
    response: Response,
    out: &mpsc::Sender<Outgoing>,
) -> Result<(), mpsc::error::SendError<Outgoing>> {
    let (parts, mut body) = response.into_parts();

    for record in Record::chunked(RecordType::Stdout, id, response_head(&parts)) {
        out.send(Outgoing::Record(record)).await?;
    }
    while let Some(frame) = body.frame().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(request_id = id, error = %e, "Response body failed");
                break;
            }
        };
        if let Ok(data) = frame.into_data() {
            for record in Record::chunked(RecordType::Stdout, id, data) {
                out.send(Outgoing::Record(record)).await?;
            }
        }
    }
    out.send(Outgoing::Record(Record::new(RecordType::Stdout, id, Bytes::new())))
        .await
}

async fn write_records<W>(
    mut sink: FramedWrite<W, RecordCodec>,
    mut rx: mpsc::Receiver<Outgoing>,
    closed: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(outgoing) = rx.recv().await {
        match outgoing {
            Outgoing::Record(record) => {
                if let Err(e) = sink.send(record).await {
                    tracing::debug!(error = %e, "FastCGI write failed");
                    break;
                }
            }
            Outgoing::Close => break,
        }
    }
    let _ = sink.close().await;
    closed.cancel();
}
