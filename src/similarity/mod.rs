mod completion;
mod enrichment;
mod error;
mod freshness;
mod lookup;
mod service;
mod single_flight;
#[cfg(test)]
pub(crate) mod test_support;

pub use completion::CompletionPolicy;
pub use enrichment::{enrich, EnrichedSimilarArtist};
pub use error::SimilarityError;
pub use freshness::{FreshnessPolicy, RefreshMode};
pub use lookup::{find_similar_artists, LookupSettings, SimilarArtist};
pub use service::{validate_artist_id, SimilarityService, SimilarityServiceOptions};
pub use single_flight::{FlightGuard, SingleFlight};
