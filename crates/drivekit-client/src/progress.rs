//! Byte-counting upload stream.
//!
//! Wraps the file bytes in a chunked stream so the request body reports how
//! much has been handed to the transport. The percentage passed to the
//! callback is raw; display offsetting happens in the upload queue.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;

/// Raw progress callback, invoked with a percentage in [0, 100].
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

const CHUNK_SIZE: usize = 64 * 1024;

pub struct ProgressStream {
    data: Bytes,
    position: usize,
    on_progress: ProgressFn,
}

impl ProgressStream {
    pub fn new(data: Bytes, on_progress: ProgressFn) -> Self {
        Self {
            data,
            position: 0,
            on_progress,
        }
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Stream for ProgressStream {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let total = this.data.len();

        if this.position >= total {
            if total == 0 && this.position == 0 {
                // Empty file: report completion once, then end the stream.
                this.position = 1;
                (this.on_progress)(100);
            }
            return Poll::Ready(None);
        }

        let end = (this.position + CHUNK_SIZE).min(total);
        let chunk = this.data.slice(this.position..end);
        this.position = end;

        let percent = (this.position * 100 / total) as u8;
        (this.on_progress)(percent);

        Poll::Ready(Some(Ok(chunk)))
    }
}
