//! Pending narration, highest priority first, FIFO within a priority

use crate::voice::Persona;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Identifier handed back by enqueue; also the FIFO tie-breaker
pub type RequestId = u64;

/// Completion callback; fires once the request played or failed
pub type Completion = Box<dyn FnOnce() + Send + 'static>;

/// A narration request as handed in by a caller
pub struct SpeechRequest {
    pub text: String,
    pub persona: Persona,
    pub priority: i32,
    pub on_complete: Option<Completion>,
}

impl std::fmt::Debug for SpeechRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechRequest")
            .field("text", &self.text)
            .field("persona", &self.persona)
            .field("priority", &self.priority)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>, persona: Persona) -> Self {
        Self {
            text: text.into(),
            persona,
            priority: 0,
            on_complete: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn on_complete(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Fire the completion callback, if any
    pub(crate) fn complete(&mut self) {
        if let Some(callback) = self.on_complete.take() {
            callback();
        }
    }
}

/// A request that made it into the queue
#[derive(Debug)]
pub struct Queued {
    pub id: RequestId,
    pub request: SpeechRequest,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    // Max-heap: higher priority first, then the lower (older) id
    fn cmp(&self, other: &Self) -> Ordering {
        self.request
            .priority
            .cmp(&other.request.priority)
            .then_with(|| other.id.cmp(&self.id))
    }
}

#[derive(Debug, Default)]
pub struct SpeechQueue {
    heap: BinaryHeap<Queued>,
    next_id: RequestId,
}

impl SpeechQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: SpeechRequest) -> RequestId {
        self.next_id += 1;
        let id = self.next_id;
        self.heap.push(Queued { id, request });
        id
    }

    pub fn pop(&mut self) -> Option<Queued> {
        self.heap.pop()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Remove everything without firing callbacks
    pub fn clear(&mut self) -> usize {
        let discarded = self.heap.len();
        self.heap.clear();
        discarded
    }
}
