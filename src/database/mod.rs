// Database module
// Remote vector storage backed by the Qdrant REST API

pub mod qdrant;

pub use qdrant::{
    CONTEXT_SEPARATOR, Distance, IndexedPoint, PointId, PointPayload, SearchHit,
    VectorStoreClient, build_context,
};
