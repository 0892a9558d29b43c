pub mod gemini;
pub mod sse;

pub use gemini::GeminiClient;
pub use sse::SseParser;
