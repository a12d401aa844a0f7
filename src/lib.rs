//! A live 3D map of memory records: embeddings become a similarity graph,
//! a force layout arranges it in space, and every frame is projected into a
//! depth-sorted draw list for whatever renderer is attached.

pub mod camera;
pub mod config;
pub mod error;
pub mod interaction;
pub mod layout;
pub mod projection;
pub mod records;
pub mod scene;
pub mod similarity;

pub use config::MapConfig;
pub use error::EmbeddingError;
pub use projection::{DrawList, EdgeSegment, NodeSprite};
pub use records::{NodeKind, NodeRecord, RecordBatch, RecordSource};
pub use scene::{CancelToken, FrameLoop, LoopStatus, Renderer, Scene, SceneCommand};
