//! Incremental decoder for `text/event-stream` bodies.
//!
//! Bytes arrive in arbitrary chunks; [`SseDecoder::push`] buffers them and
//! returns every event completed by the chunk. Only the `event` and `data`
//! fields are kept. Comment lines (`:`) and `id`/`retry` fields are dropped.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type; `"message"` when the frame carries no `event:` line.
    pub event: String,
    /// `data:` lines joined with `\n`.
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect the events it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line.as_ref(), ""),
            };
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }

        events
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() && event.is_none() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_firebase_frames() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(
            b"event: put\ndata: {\"path\":\"/\",\"data\":null}\n\nevent: keep-alive\ndata: null\n\n",
        );
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, "put");
        assert_eq!(events[0].data, r#"{"path":"/","data":null}"#);
        assert_eq!(events[1].event, "keep-alive");
    }

    #[test]
    fn frames_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"event: pa").is_empty());
        assert!(decoder.push(b"tch\r\ndata: {\"a\":").is_empty());
        let events = decoder.push(b"1}\r\n\r\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event: "patch".into(),
                data: "{\"a\":1}".into()
            }]
        );
    }

    #[test]
    fn multi_line_data_and_comments() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": ping\ndata: one\ndata: two\n\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "one\ntwo");
    }
}
