pub mod aggregator;
pub mod ai;
pub mod chat;
pub mod config;
pub mod controller;
pub mod drafts;
pub mod error;
pub mod gateway;
pub mod geo;
pub mod grounding;
pub mod mode;
pub mod prompts;
pub mod requests;
pub mod state;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

// Re-export main types for convenience
pub use aggregator::{aggregate, StreamUpdate};
pub use ai::GeminiClient;
pub use chat::{ChatController, ChatTurn, Transcript};
pub use config::Config;
pub use controller::{ModeController, ModeOutput};
pub use drafts::{DraftStore, MemoryDraftStore, SqliteDraftStore};
pub use error::{DraftError, GatewayError};
pub use gateway::{ChatSession, FragmentStream, Gateway, GenerateOptions, Generation};
pub use geo::{acquire_location, LocationProvider};
pub use mode::{Mode, Tone, LANGUAGES};
pub use requests::{execute, ModeRequest};
pub use state::{ChatMessage, ChatRole, GroundingResult, GroundingSource, LatLng, RequestStatus};
