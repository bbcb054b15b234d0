//! Input and output endpoints of a VM instance.
//!
//! A VM pops from an [`Input`] when it executes `store` and pushes to an
//! [`Output`] when it executes `output`. Both are unbounded FIFO queues:
//! - [`VecDeque<i64>`] and [`Vec<i64>`] for single-shot runs, where the caller
//!   fills the input up front and drains the output afterwards
//! - [`ChannelInput`] and [`UnboundedSender<i64>`] for pipelines, where one
//!   instance's output channel is the next instance's input channel
//!
//! An empty input is not an error: `pop` returns `None` and the VM suspends
//! on the `store` instruction until more input is available.

use std::collections::VecDeque;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;

/// Source of values for the `store` instruction.
pub trait Input {
    /// Takes the next value without waiting, or `None` if nothing is queued.
    fn pop(&mut self) -> Option<i64>;
}

/// Sink for values produced by the `output` instruction.
pub trait Output {
    fn push(&mut self, value: i64);
}

impl Input for VecDeque<i64> {
    fn pop(&mut self) -> Option<i64> {
        self.pop_front()
    }
}

impl Output for VecDeque<i64> {
    fn push(&mut self, value: i64) {
        self.push_back(value);
    }
}

impl Output for Vec<i64> {
    fn push(&mut self, value: i64) {
        Vec::push(self, value);
    }
}

impl<T: Input + ?Sized> Input for &mut T {
    fn pop(&mut self) -> Option<i64> {
        (**self).pop()
    }
}

impl<T: Output + ?Sized> Output for &mut T {
    fn push(&mut self, value: i64) {
        (**self).push(value)
    }
}

/// Values sent to a consumer that has already gone away are dropped; the
/// consumer's own fault is what the pipeline reports.
impl Output for UnboundedSender<i64> {
    fn push(&mut self, value: i64) {
        let _ = self.send(value);
    }
}

/// Receiving end of a pipeline channel.
///
/// Waiting happens outside the VM: when the VM suspends on `store`, the
/// driver awaits [`ChannelInput::ready`], which parks the task until the
/// upstream instance produces a value.
pub struct ChannelInput {
    rx: UnboundedReceiver<i64>,
    pending: VecDeque<i64>,
}

impl ChannelInput {
    pub fn new(rx: UnboundedReceiver<i64>) -> Self {
        Self {
            rx,
            pending: VecDeque::new(),
        }
    }

    /// Waits until at least one value can be popped.
    ///
    /// Returns `false` once the channel is empty and every sender is dropped,
    /// meaning no value will ever arrive.
    pub async fn ready(&mut self) -> bool {
        if !self.pending.is_empty() {
            return true;
        }
        match self.rx.recv().await {
            Some(value) => {
                self.pending.push_back(value);
                true
            }
            None => false,
        }
    }

    /// Takes every value still queued, without waiting.
    pub fn drain(&mut self) -> Vec<i64> {
        let mut values: Vec<i64> = self.pending.drain(..).collect();
        while let Ok(value) = self.rx.try_recv() {
            values.push(value);
        }
        values
    }
}

impl Input for ChannelInput {
    fn pop(&mut self) -> Option<i64> {
        self.pending.pop_front().or_else(|| self.rx.try_recv().ok())
    }
}
