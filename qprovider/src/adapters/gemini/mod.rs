mod provider;
mod serde_api;
mod tests;
mod transport;
mod types;

pub use provider::GeminiProvider;
pub use transport::{GeminiChunkStream, GeminiHttpTransport, GeminiTransport};
pub use types::{GeminiRequest, GeminiResponse, GeminiStreamChunk};
