mod run;
pub mod backend;
pub mod config;
pub mod corpus;
pub mod errors;
pub mod memory;
pub mod model;
pub mod query;
pub mod serializer;
pub mod similarity;
pub mod train;

pub use run::{usage, Cli, Command, Run};
pub use backend::{EmbeddingBackend, NativeBackend};
pub use config::{Algorithm, Properties, VectorsConfiguration};
pub use errors::{Result, Word2VecError};
pub use model::Word2Vec;
pub use similarity::Similarity;
