//! BatchHandler - items を溜めて sink へまとめて流す
//!
//! # 設計
//! - sink は「一回の一括送信」を表す（`BatchSink`）
//! - `batch_size` を指定すると、溜まった時点で `add` の中で自動 flush
//! - `BatchScope` はスコープ終了時（早期 return / エラー / panic を含む）に
//!   残りを一度だけ flush する
//!
//! Single owner only: there is no internal locking.

use std::fmt;
use std::ops::{Deref, DerefMut};

/// One batch-send call.
///
/// Any `FnMut(Vec<T>) -> Result<R, E>` is a sink; extra arguments are
/// whatever the closure captures.
pub trait BatchSink<T> {
    type Output;
    type Error;

    fn send(&mut self, batch: Vec<T>) -> Result<Self::Output, Self::Error>;
}

impl<T, R, E, F> BatchSink<T> for F
where
    F: FnMut(Vec<T>) -> Result<R, E>,
{
    type Output = R;
    type Error = E;

    fn send(&mut self, batch: Vec<T>) -> Result<R, E> {
        self(batch)
    }
}

pub struct BatchHandler<T, S> {
    sink: S,
    items: Vec<T>,
    batch_size: Option<usize>,
}

impl<T, S: BatchSink<T>> BatchHandler<T, S> {
    /// Unbounded: items are only sent on `execute`.
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            items: Vec::new(),
            batch_size: None,
        }
    }

    /// Size-bounded: `add` flushes as soon as `batch_size` items are held.
    /// A `batch_size` of 0 is treated as 1.
    pub fn with_batch_size(sink: S, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            sink,
            items: Vec::with_capacity(batch_size),
            batch_size: Some(batch_size),
        }
    }

    /// Buffer one item; returns the sink's result when this add flushed.
    pub fn add(&mut self, item: T) -> Result<Option<S::Output>, S::Error> {
        self.items.push(item);
        match self.batch_size {
            Some(limit) if self.items.len() >= limit => self.execute(),
            _ => Ok(None),
        }
    }

    /// Send everything buffered. No-op (the sink is not called) when empty.
    ///
    /// The buffer is cleared before the send; a failed batch is not kept
    /// for another attempt.
    pub fn execute(&mut self) -> Result<Option<S::Output>, S::Error> {
        if self.items.is_empty() {
            return Ok(None);
        }
        let batch = std::mem::take(&mut self.items);
        self.sink.send(batch).map(Some)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn batch_size(&self) -> Option<usize> {
        self.batch_size
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

/// Scoped acquisition of a [`BatchHandler`].
///
/// Whatever is still buffered when the scope ends is flushed exactly once:
/// by [`BatchScope::finish`] on the normal path, or on drop otherwise. A
/// flush failure on drop can only be logged.
pub struct BatchScope<T, S>
where
    S: BatchSink<T>,
    S::Error: fmt::Display,
{
    handler: BatchHandler<T, S>,
}

impl<T, S> BatchScope<T, S>
where
    S: BatchSink<T>,
    S::Error: fmt::Display,
{
    pub fn new(handler: BatchHandler<T, S>) -> Self {
        Self { handler }
    }

    /// Flush the remainder and close the scope.
    pub fn finish(mut self) -> Result<Option<S::Output>, S::Error> {
        self.handler.execute()
    }
}

impl<T, S> Deref for BatchScope<T, S>
where
    S: BatchSink<T>,
    S::Error: fmt::Display,
{
    type Target = BatchHandler<T, S>;

    fn deref(&self) -> &Self::Target {
        &self.handler
    }
}

impl<T, S> DerefMut for BatchScope<T, S>
where
    S: BatchSink<T>,
    S::Error: fmt::Display,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.handler
    }
}

impl<T, S> Drop for BatchScope<T, S>
where
    S: BatchSink<T>,
    S::Error: fmt::Display,
{
    fn drop(&mut self) {
        if self.handler.is_empty() {
            return;
        }
        let pending = self.handler.len();
        if let Err(e) = self.handler.execute() {
            tracing::error!(pending, error = %e, "batch flush on scope exit failed");
        }
    }
}

/// Run `body` against a scoped handler and flush the remainder afterwards,
/// whether `body` succeeded or not.
///
/// When both `body` and the final flush fail, the body's error wins and the
/// flush error is logged.
pub fn with_batch_handler<T, S, R, E, B>(handler: BatchHandler<T, S>, body: B) -> Result<R, E>
where
    S: BatchSink<T>,
    S::Error: fmt::Display,
    E: From<S::Error>,
    B: FnOnce(&mut BatchHandler<T, S>) -> Result<R, E>,
{
    let mut scope = BatchScope::new(handler);
    let result = body(&mut scope);
    let flushed = scope.finish();
    match (result, flushed) {
        (Ok(value), Ok(_)) => Ok(value),
        (Ok(_), Err(e)) => Err(E::from(e)),
        (Err(e), Ok(_)) => Err(e),
        (Err(e), Err(flush_err)) => {
            tracing::warn!(error = %flush_err, "final batch flush failed after body error");
            Err(e)
        }
    }
}
