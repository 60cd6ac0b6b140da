//! Reply Stream Reader
//!
//! Drives a [`StreamDemultiplexer`] over a reply body on a tokio task and
//! forwards decoded events over a channel. The task only reads; applying
//! events to conversation state stays with the channel owner.

use futures::StreamExt;
use tokio::sync::mpsc;

use super::demux::StreamDemultiplexer;
use super::event::{EventKind, StreamEvent};
use crate::api::ByteStream;

/// Channel capacity between the reader task and its owner
const READER_CHANNEL_CAPACITY: usize = 100;

/// Output of the reader task, in stream order
#[derive(Clone, Debug, PartialEq)]
pub enum StreamUpdate {
    /// A decoded record
    Event(StreamEvent),
    /// The transport failed mid-body
    Failed(String),
    /// The body ended
    Ended,
}

/// Decode every complete record in the demultiplexer
///
/// Malformed records are logged and skipped. Returns `true` when a
/// `RunCompleted` record was decoded; records after it are not decoded.
pub fn decode_records(demux: &mut StreamDemultiplexer, out: &mut Vec<StreamEvent>) -> bool {
    while let Some(record) = demux.next_record() {
        match StreamEvent::parse(&record) {
            Ok(event) => {
                let completed = event.kind() == EventKind::RunCompleted;
                out.push(event);
                if completed {
                    return true;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, record = %record, "Skipping malformed stream record");
            }
        }
    }
    false
}

/// Spawn a task reading `body` and return the update receiver
///
/// The task ends after forwarding `RunCompleted`, at end of body, on a
/// transport error, or once the receiver is dropped.
#[must_use]
pub fn spawn_reader(mut body: ByteStream) -> mpsc::Receiver<StreamUpdate> {
    let (tx, rx) = mpsc::channel(READER_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut demux = StreamDemultiplexer::new();
        let mut events = Vec::new();

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    demux.feed(&bytes);
                    let completed = decode_records(&mut demux, &mut events);
                    for event in events.drain(..) {
                        tracing::debug!(event = ?event.event, "Stream record");
                        if tx.send(StreamUpdate::Event(event)).await.is_err() {
                            // Receiver dropped, stop reading
                            return;
                        }
                    }
                    if completed {
                        return;
                    }
                }
                Err(e) => {
                    let _ = tx.send(StreamUpdate::Failed(e.to_string())).await;
                    return;
                }
            }
        }

        if demux.has_leftover() {
            tracing::warn!(
                leftover = %String::from_utf8_lossy(demux.pending()),
                "Unterminated data left in stream buffer"
            );
        }
        let _ = tx.send(StreamUpdate::Ended).await;
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;

    use crate::api::ApiError;

    fn body(chunks: &[&'static str]) -> ByteStream {
        let items: Vec<Result<Bytes, ApiError>> = chunks
            .iter()
            .map(|c| Ok(Bytes::from_static(c.as_bytes())))
            .collect();
        stream::iter(items).boxed()
    }

    async fn collect(mut rx: mpsc::Receiver<StreamUpdate>) -> Vec<StreamUpdate> {
        let mut updates = Vec::new();
        while let Some(update) = rx.recv().await {
            updates.push(update);
        }
        updates
    }

    #[test]
    fn test_decode_records_stops_at_run_completed() {
        let mut demux = StreamDemultiplexer::new();
        demux.feed_str(r#"{"content":"a"}{"event":"RunCompleted"}{"content":"b"}"#);

        let mut out = Vec::new();
        assert!(decode_records(&mut demux, &mut out));
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].kind(), EventKind::RunCompleted);
    }

    #[test]
    fn test_decode_records_skips_malformed() {
        let mut demux = StreamDemultiplexer::new();
        demux.feed_str(r#"{"content":"a"}{oops}{"content":"b"}"#);

        let mut out = Vec::new();
        assert!(!decode_records(&mut demux, &mut out));
        let texts: Vec<_> = out.iter().filter_map(StreamEvent::text).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_reader_forwards_in_order_and_ends() {
        let rx = spawn_reader(body(&[
            "{\"event\":\"RunStarted\"}\n{\"con",
            "tent\":\"Hel\"}\n",
            "{\"content\":\"lo\"}\n",
        ]));

        let updates = collect(rx).await;
        assert_eq!(
            updates,
            vec![
                StreamUpdate::Event(StreamEvent::tagged("RunStarted")),
                StreamUpdate::Event(StreamEvent::delta("Hel")),
                StreamUpdate::Event(StreamEvent::delta("lo")),
                StreamUpdate::Ended,
            ]
        );
    }

    #[tokio::test]
    async fn test_reader_stops_after_run_completed() {
        let rx = spawn_reader(body(&[
            "{\"content\":\"x\"}{\"event\":\"RunCompleted\"}{\"content\":\"late\"}",
            "{\"content\":\"later\"}",
        ]));

        let updates = collect(rx).await;
        assert_eq!(
            updates,
            vec![
                StreamUpdate::Event(StreamEvent::delta("x")),
                StreamUpdate::Event(StreamEvent::tagged("RunCompleted")),
            ]
        );
    }

    #[tokio::test]
    async fn test_reader_reports_transport_failure() {
        let items: Vec<Result<Bytes, ApiError>> = vec![
            Ok(Bytes::from_static(b"{\"content\":\"par")),
            Err(ApiError::Decode("connection reset".to_string())),
        ];
        let rx = spawn_reader(stream::iter(items).boxed());

        let updates = collect(rx).await;
        assert_eq!(updates.len(), 1);
        assert!(matches!(&updates[0], StreamUpdate::Failed(msg) if msg.contains("connection reset")));
    }
}
