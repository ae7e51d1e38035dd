// Embeddings module
// Fixed-width chunking and the Gemini embedding client

pub mod chunking;
pub mod gemini;

pub use chunking::{Chunk, DEFAULT_CHUNK_SIZE, chunk_text};
pub use gemini::EmbeddingClient;
