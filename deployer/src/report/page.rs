//! Web page sink
//!
//! Renders reports as an HTML page, one styled paragraph per message.
//! The page goes either to a live HTTP response ([`StreamOutput`]) or to
//! memory ([`BufferOutput`]) so it can be mailed later.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::channel::mpsc;
use tracing::{debug, warn};

use crate::deploy::fsm::PageState;
use crate::report::markup;
use crate::report::{Level, ReportSink};

const PREAMBLE: &str =
    "<html>\n<head><meta charset=\"UTF-8\"><title>Manual Deployment</title></head>\n<body>\n";
const HEADLINE: &str = "<h1>Started Deployment</h1>\n";
const CLOSING: &str = "</body>\n</html>";

/// Where page chunks are written
pub trait PageOutput: Send {
    fn write(&mut self, chunk: &str);

    /// Write the last chunk and end the output.
    fn end(&mut self, chunk: &str);
}

/// Chunk stream feeding a streamed HTTP response body
pub struct StreamOutput {
    tx: mpsc::UnboundedSender<Result<String, std::io::Error>>,
}

impl StreamOutput {
    /// Create an output and the receiving end to use as a response body.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Result<String, std::io::Error>>) {
        let (tx, rx) = mpsc::unbounded();
        (Self { tx }, rx)
    }
}

impl PageOutput for StreamOutput {
    fn write(&mut self, chunk: &str) {
        if self.tx.unbounded_send(Ok(chunk.to_string())).is_err() {
            debug!("Page client went away, dropping output");
        }
    }

    fn end(&mut self, chunk: &str) {
        self.write(chunk);
        self.tx.close_channel();
    }
}

/// In-memory page, shared with whoever wants to read it back
#[derive(Debug, Clone, Default)]
pub struct BufferOutput {
    inner: Arc<Mutex<Buffer>>,
}

#[derive(Debug, Default)]
struct Buffer {
    contents: String,
    finished: bool,
}

impl BufferOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far
    pub fn contents(&self) -> String {
        self.lock().contents.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PageOutput for BufferOutput {
    fn write(&mut self, chunk: &str) {
        self.lock().contents.push_str(chunk);
    }

    fn end(&mut self, chunk: &str) {
        let mut buffer = self.lock();
        buffer.contents.push_str(chunk);
        buffer.finished = true;
    }
}

struct Page {
    output: Box<dyn PageOutput>,
    state: PageState,
}

/// Sink that writes an HTML page.
///
/// Reports after [`PageSink::close`] would land after `</html>`; they are
/// dropped with a warning instead, and a second close is a no-op.
pub struct PageSink {
    page: Mutex<Page>,
    forward: Option<Arc<dyn ReportSink>>,
}

impl PageSink {
    /// Start a page on `output`, writing the preamble immediately.
    pub fn new(output: impl PageOutput + 'static) -> Self {
        let mut output: Box<dyn PageOutput> = Box::new(output);
        output.write(PREAMBLE);
        output.write(HEADLINE);
        Self {
            page: Mutex::new(Page {
                output,
                state: PageState::Open,
            }),
            forward: None,
        }
    }

    /// Also pass every report to `sink`, before it is rendered.
    pub fn forwarding_to(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.forward = Some(sink);
        self
    }

    pub fn state(&self) -> PageState {
        self.lock().state
    }

    /// Finish the page. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        let mut page = self.lock();
        match page.state {
            PageState::Open => {
                page.output.end(CLOSING);
                page.state = PageState::Closed;
                true
            }
            PageState::Closed => {
                debug!("Page already closed");
                false
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Page> {
        self.page.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ReportSink for PageSink {
    fn report(&self, level: Level, message: &str) {
        if let Some(forward) = &self.forward {
            forward.report(level, message);
        }
        let mut page = self.lock();
        if page.state == PageState::Closed {
            warn!("Dropping {} report on a closed page: {}", level, markup::strip(message));
            return;
        }
        let paragraph = format!(
            "<p style=\"color: {}\">\n{}\n</p>\n",
            color_for(level),
            markup::to_html(&markup::escape_html(message))
        );
        page.output.write(&paragraph);
    }
}

fn color_for(level: Level) -> &'static str {
    match level {
        Level::Debug => "gray",
        Level::Info | Level::Notice => "black",
        Level::Warning => "orange",
        Level::Error | Level::Critical | Level::Alert | Level::Emergency => "red",
    }
}
