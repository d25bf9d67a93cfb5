mod models;
mod schema;
mod store;
mod trait_def;

pub use models::{
    ArticleEmbedding, Artist, NeighborMatch, SimilarityFactors, SimilarityMetadata,
    SimilarityRecord, SimilarityStats, WIKIPEDIA_SOURCE,
};
pub use store::{cosine_similarity, SqliteSimilarityStore};
pub use trait_def::SimilarityStore;
