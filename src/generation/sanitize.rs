//! Removal of `<think>…</think>` reasoning spans from generated text.
//!
//! [`ThinkFilter`] is fed chunk by chunk and copes with markers split across chunks.
//! [`clean_response`] applies the same machine to a complete text. Only closed spans are
//! removed: text after a `<think>` that never closes is kept verbatim, marker included.

const START_MARKER: &str = "<think>";
const END_MARKER: &str = "</think>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterState {
    #[default]
    Normal,
    InsideExcludedSpan,
}

/// Streaming filter; one instance per output stream.
#[derive(Debug, Clone, Default)]
pub struct ThinkFilter {
    state: FilterState,
    pending: String,
    /// Text of the open span (starting with the marker), restored if it never closes.
    span: String,
}

impl ThinkFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FilterState {
        self.state
    }

    /// Consumes `chunk` and returns the text that is safe to emit now.
    ///
    /// A trailing fragment that could be the beginning of a marker is held back until the
    /// next call (or [`finish`](Self::finish)), as is the content of an open span.
    pub fn push(&mut self, chunk: &str) -> String {
        self.pending.push_str(chunk);
        let mut out = String::new();

        loop {
            match self.state {
                FilterState::Normal => {
                    if let Some(pos) = self.pending.find(START_MARKER) {
                        out.push_str(&self.pending[..pos]);
                        self.pending.drain(..pos + START_MARKER.len());
                        self.span.clear();
                        self.span.push_str(START_MARKER);
                        self.state = FilterState::InsideExcludedSpan;
                    } else {
                        let held = partial_marker_len(&self.pending, START_MARKER);
                        let emit = self.pending.len() - held;
                        out.push_str(&self.pending[..emit]);
                        self.pending.drain(..emit);
                        break;
                    }
                }
                FilterState::InsideExcludedSpan => {
                    if let Some(pos) = self.pending.find(END_MARKER) {
                        self.pending.drain(..pos + END_MARKER.len());
                        self.span.clear();
                        self.state = FilterState::Normal;
                    } else {
                        let held = partial_marker_len(&self.pending, END_MARKER);
                        let keep = self.pending.len() - held;
                        self.span.extend(self.pending.drain(..keep));
                        break;
                    }
                }
            }
        }

        out
    }

    /// Flushes held-back text at end of stream.
    ///
    /// An unterminated span is released as-is, opening marker included.
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        let mut span = std::mem::take(&mut self.span);
        match std::mem::take(&mut self.state) {
            FilterState::Normal => rest,
            FilterState::InsideExcludedSpan => {
                span.push_str(&rest);
                span
            }
        }
    }
}

/// Strips every closed reasoning span from a complete response.
pub fn clean_response(text: &str) -> String {
    let mut filter = ThinkFilter::new();
    let mut out = filter.push(text);
    out.push_str(&filter.finish());
    out
}

/// Length of the longest proper prefix of `marker` that `text` ends with.
fn partial_marker_len(text: &str, marker: &str) -> usize {
    (1..marker.len())
        .rev()
        .find(|&k| text.ends_with(&marker[..k]))
        .unwrap_or(0)
}
