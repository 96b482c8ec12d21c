//! Consumption of the server's SSE stream.
//!
//! The stream is best-effort: on any disconnect the caller reconnects and
//! runs a catch-up poll, and [`crate::SyncSession`] deduplicates whatever
//! arrives twice. No delivery state is kept here.

use std::collections::VecDeque;

use futures::stream::{self, Stream, StreamExt};

use bloomsync_core::types::RealtimeUpdate;

use crate::error::ClientError;

/// A decoded server event.
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    /// Stream established; run a catch-up poll before trusting it.
    Connected,
    OrderUpdate(RealtimeUpdate),
}

/// One wire frame: optional `event:` name plus joined `data:` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental SSE frame parser.
///
/// Feed it raw chunks as they arrive; it buffers partial lines across chunk
/// boundaries, joins multi-line `data:` fields, ignores comment lines
/// (heartbeats arrive as `: heartbeat`), and emits a frame per blank line.
#[derive(Debug, Default)]
pub struct SseParser {
    line_buf: String,
    event: Option<String>,
    data_lines: Vec<String>,
}

impl SseParser {
    /// Consumes a chunk and returns every frame completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        self.line_buf.push_str(&String::from_utf8_lossy(chunk));

        while let Some(newline) = self.line_buf.find('\n') {
            let line: String = self.line_buf.drain(..=newline).collect();
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(frame) = self.finish_frame() {
                    frames.push(frame);
                }
            } else if let Some(name) = line.strip_prefix("event:") {
                self.event = Some(name.trim().to_string());
            } else if let Some(data) = line.strip_prefix("data:") {
                self.data_lines.push(data.strip_prefix(' ').unwrap_or(data).to_string());
            }
            // Comment lines (": heartbeat") and unknown fields are dropped.
        }

        frames
    }

    fn finish_frame(&mut self) -> Option<SseFrame> {
        if self.event.is_none() && self.data_lines.is_empty() {
            return None;
        }
        Some(SseFrame {
            event: self.event.take(),
            data: std::mem::take(&mut self.data_lines).join("\n"),
        })
    }
}

/// Maps a wire frame to a typed event. Unknown event names and undecodable
/// payloads are skipped, not errors; the poll path is authoritative.
#[must_use]
pub fn decode_frame(frame: &SseFrame) -> Option<SseEvent> {
    match frame.event.as_deref() {
        Some("connected") => Some(SseEvent::Connected),
        Some("order_update") => match serde_json::from_str::<RealtimeUpdate>(&frame.data) {
            Ok(update) => Some(SseEvent::OrderUpdate(update)),
            Err(error) => {
                tracing::warn!(%error, "undecodable order_update payload, skipping");
                None
            }
        },
        _ => None,
    }
}

/// Subscriber for one tenant's update stream.
#[derive(Debug, Clone)]
pub struct SseClient {
    http: reqwest::Client,
    base_url: String,
    tenant_id: String,
    api_key: Option<String>,
}

impl SseClient {
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        base_url: &str,
        tenant_id: &str,
        api_key: Option<String>,
    ) -> Result<Self, ClientError> {
        // No overall timeout: the connection is expected to stay open.
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tenant_id: tenant_id.to_string(),
            api_key,
        })
    }

    /// Opens the stream and yields decoded events until the server closes
    /// it or the connection drops. The caller owns the reconnect loop:
    /// resubscribe with backoff and poll for whatever was missed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the stream cannot be established,
    /// or [`ClientError::Api`] on a non-2xx response.
    pub async fn subscribe(&self) -> Result<impl Stream<Item = SseEvent>, ClientError> {
        let url = format!(
            "{}/api/v1/realtime/orders?tenant_id={}",
            self.base_url, self.tenant_id
        );
        let mut request = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream");
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Api {
                status: response.status().as_u16(),
                code: "stream_rejected".to_string(),
                message: format!("SSE subscription to {url} refused"),
            });
        }
        tracing::debug!(tenant_id = %self.tenant_id, "sse stream established");

        let state = (
            response.bytes_stream(),
            SseParser::default(),
            VecDeque::new(),
        );
        Ok(stream::unfold(
            state,
            |(mut bytes, mut parser, mut queue)| async move {
                loop {
                    if let Some(event) = queue.pop_front() {
                        return Some((event, (bytes, parser, queue)));
                    }
                    match bytes.next().await {
                        Some(Ok(chunk)) => {
                            queue.extend(parser.push(&chunk).iter().filter_map(decode_frame));
                        }
                        Some(Err(error)) => {
                            tracing::debug!(%error, "sse stream errored, ending");
                            return None;
                        }
                        None => return None,
                    }
                }
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloomsync_core::types::UpdateKind;

    #[test]
    fn parses_frames_split_across_chunks() {
        let mut parser = SseParser::default();
        assert!(parser.push(b"event: conn").is_empty());
        let frames = parser.push(b"ected\ndata: {}\n\nevent: order_update\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                event: Some("connected".to_string()),
                data: "{}".to_string(),
            }]
        );

        let frames = parser.push(b"data: {\"a\":1}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("order_update"));
        assert_eq!(frames[0].data, "{\"a\":1}");
    }

    #[test]
    fn joins_multi_line_data() {
        let mut parser = SseParser::default();
        let frames = parser.push(b"data: line1\ndata: line2\n\n");
        assert_eq!(frames[0].data, "line1\nline2");
    }

    #[test]
    fn ignores_heartbeat_comments_and_blank_noise() {
        let mut parser = SseParser::default();
        assert!(parser.push(b": heartbeat\n\n: heartbeat\n\n").is_empty());
    }

    #[test]
    fn handles_crlf_line_endings() {
        let mut parser = SseParser::default();
        let frames = parser.push(b"event: connected\r\ndata: {}\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("connected"));
    }

    #[test]
    fn decodes_order_update_payload() {
        let frame = SseFrame {
            event: Some("order_update".to_string()),
            data: serde_json::json!({
                "type": "order_updated",
                "card_id": "abc",
                "tenant_id": "t1",
                "timestamp": "2025-01-25T10:00:00Z",
                "updated_by": "florist-7",
                "changed_fields": {"status": "assigned"},
                "state": {
                    "card_id": "abc",
                    "tenant_id": "t1",
                    "status": "assigned",
                    "assigned_to": "florist-7",
                    "notes": null,
                    "sort_order": 0,
                    "is_stale": false,
                    "updated_at": "2025-01-25T10:00:00Z",
                    "updated_by": "florist-7"
                }
            })
            .to_string(),
        };
        let event = decode_frame(&frame).expect("decoded");
        let SseEvent::OrderUpdate(update) = event else {
            panic!("expected order update");
        };
        assert_eq!(update.kind, UpdateKind::OrderUpdated);
        assert_eq!(update.card_id, "abc");
        assert_eq!(update.state.card_id, "abc", "full row rides along");
    }

    #[test]
    fn undecodable_payload_is_skipped() {
        let frame = SseFrame {
            event: Some("order_update".to_string()),
            data: "not json".to_string(),
        };
        assert!(decode_frame(&frame).is_none());
    }

    #[test]
    fn unknown_event_name_is_skipped() {
        let frame = SseFrame {
            event: Some("server_gossip".to_string()),
            data: "{}".to_string(),
        };
        assert!(decode_frame(&frame).is_none());
    }
}
