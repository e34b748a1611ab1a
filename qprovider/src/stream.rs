//! Streaming delta contracts and in-memory stream utilities.
//!
//! ```rust
//! use qprovider::{BoxedDeltaStream, ProviderDelta, VecDeltaStream};
//!
//! let stream = VecDeltaStream::new(vec![Ok(ProviderDelta::Text("hello".into()))]);
//! let _boxed: BoxedDeltaStream<'static> = Box::pin(stream);
//! ```

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::{ProviderError, TokenUsage};

/// One unit of streamed backend output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderDelta {
    Text(String),
    Usage(TokenUsage),
}

/// Provider delta stream contract.
///
/// Invariants for consumers:
/// - Deltas arrive in source order; consumers buffer at most one at a time.
/// - `Text` may appear zero or more times; `Usage` at most once, after the
///   text it accounts for.
/// - Once the stream yields `None`, it must not yield additional items.
pub trait DeltaStream: Stream<Item = Result<ProviderDelta, ProviderError>> + Send {}

impl<T> DeltaStream for T where T: Stream<Item = Result<ProviderDelta, ProviderError>> + Send {}

pub type BoxedDeltaStream<'a> = Pin<Box<dyn DeltaStream + 'a>>;

#[derive(Debug)]
pub struct VecDeltaStream {
    deltas: VecDeque<Result<ProviderDelta, ProviderError>>,
}

impl VecDeltaStream {
    pub fn new(deltas: Vec<Result<ProviderDelta, ProviderError>>) -> Self {
        Self {
            deltas: deltas.into(),
        }
    }
}

impl Stream for VecDeltaStream {
    type Item = Result<ProviderDelta, ProviderError>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<ProviderDelta, ProviderError>>> {
        Poll::Ready(self.deltas.pop_front())
    }
}
