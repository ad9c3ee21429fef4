use std::pin::Pin;

use crate::error::Result;

/// A boxed async stream, used for provider streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Lazy, finite sequence of answer text fragments. An `Err` item terminates
/// the sequence.
pub type FragmentStream = BoxStream<'static, Result<String>>;
