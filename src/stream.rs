//! Async event streaming.
//!
//! [`ExtractionStream`] runs an extraction on Tokio's blocking pool and
//! yields its [`ExtractionEvent`]s through a bounded channel, so the CPU-
//! and process-bound work never ties up the async runtime.
//!
//! # Example
//!
//! ```no_run
//! use tokio_stream::StreamExt;
//!
//! use frame2img::{ExtractionEvent, ExtractionRequest, Extractor, ExtractorOptions};
//!
//! # async fn example() {
//! let extractor = Extractor::new(ExtractorOptions::new());
//! let mut stream = extractor.stream(ExtractionRequest::new("input.mp4", "out"));
//!
//! while let Some(event) = stream.next().await {
//!     if let ExtractionEvent::Finished(result) = event {
//!         println!("{result}");
//!     }
//! }
//! # }
//! ```

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinHandle;
use tokio_stream::Stream;

use crate::config::ExtractionRequest;
use crate::extractor::{ExtractionEvent, Extractor};
use crate::progress::{CancellationToken, ExtractionObserver, ProgressEvent};

/// A stream of events produced by a background extraction.
///
/// Implements [`tokio_stream::Stream`]; the last item is always
/// [`ExtractionEvent::Finished`]. Dropping the stream cancels the run at
/// its next check point.
pub struct ExtractionStream {
    receiver: Receiver<ExtractionEvent>,
    cancel: CancellationToken,
    #[allow(dead_code)]
    handle: JoinHandle<()>,
}

impl ExtractionStream {
    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Stream for ExtractionStream {
    type Item = ExtractionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for ExtractionStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct AsyncChannelObserver {
    sender: Sender<ExtractionEvent>,
}

impl ExtractionObserver for AsyncChannelObserver {
    fn on_progress(&self, event: &ProgressEvent) {
        let _ = self
            .sender
            .blocking_send(ExtractionEvent::Progress(event.clone()));
    }

    fn on_status(&self, message: &str) {
        let _ = self
            .sender
            .blocking_send(ExtractionEvent::Status(message.to_string()));
    }
}

impl Extractor {
    /// Run `request` on Tokio's blocking pool and stream its events.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn stream(&self, request: ExtractionRequest) -> ExtractionStream {
        let capacity = self.options().channel_capacity.max(1);
        let (sender, receiver) = tokio::sync::mpsc::channel(capacity);
        let cancel = CancellationToken::new();

        let extractor = self.clone();
        let worker_cancel = cancel.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let observer = Arc::new(AsyncChannelObserver {
                sender: sender.clone(),
            });
            let result = extractor.run(&request, observer, &worker_cancel);
            let _ = sender.blocking_send(ExtractionEvent::Finished(result));
        });

        ExtractionStream {
            receiver,
            cancel,
            handle,
        }
    }
}
