pub mod definition;
pub mod fuzzy;
pub mod repository;
pub mod spec;
pub mod synthesizer;

pub use definition::{QueryDefinition, QueryParameter, ReturnShape};
pub use fuzzy::FuzzySearchSynthesizer;
pub use repository::RepositorySurface;
pub use spec::{
    AND_TOKEN, Declarations, FieldLookupSpec, LookupMarker, OR_TOKEN, QueryKind,
    QuerySpecification,
};
pub use synthesizer::QuerySpecSynthesizer;
