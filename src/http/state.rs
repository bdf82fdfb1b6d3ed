use crate::db::NoteStore;
use crate::identity::SequenceAllocator;
use crate::transcribe::TranscriptionDispatcher;
use std::sync::Arc;

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<TranscriptionDispatcher>,
    pub notes: Arc<dyn NoteStore>,
    pub allocator: Arc<SequenceAllocator>,
}

impl AppState {
    pub fn new(
        dispatcher: Arc<TranscriptionDispatcher>,
        notes: Arc<dyn NoteStore>,
        allocator: Arc<SequenceAllocator>,
    ) -> Self {
        Self {
            dispatcher,
            notes,
            allocator,
        }
    }
}
