pub mod analyze;
pub mod audio;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod identity;
pub mod session;
pub mod transcribe;

pub use analyze::{AnalysisEnricher, Annotation, Enricher};
pub use audio::{
    AudioArtifact, AudioCapture, AudioEncoding, AudioFragment, CaptureConfig, CaptureError,
    FragmentSource, ScriptedSource,
};
pub use config::{Config, SttMode};
pub use db::{
    GatewayError, InMemorySlotStore, NewNote, NoteRecord, NoteStore, PersistenceGateway,
    PgNoteStore, PgSlotStore, SlotStats, SlotStore,
};
pub use error::SessionError;
pub use http::{create_router, AppState};
pub use identity::{ensure_identity, AllocateError, OwnerIdentity, SequenceAllocator};
pub use session::{
    RecordingSessionController, SessionDeps, SessionPhase, SessionStats, StopReason,
};
pub use transcribe::{
    BlobStore, GcsBlobStore, GoogleSpeechClient, JobHandle, JobState, SpeechProvider,
    TranscribeError, TranscriptionDispatcher, TranscriptSegment,
};
