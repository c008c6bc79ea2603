//! Source clients (C1): one module per external API, each implementing [`SourceProvider`].

pub mod arxiv;
pub mod biorxiv;
pub mod core;
pub mod crossref;
pub mod europe_pmc;
pub mod gray_market;
pub mod openalex;
pub mod opencitations;
pub mod pmc;
pub mod pubmed;
pub mod semantic_scholar;
pub mod traits;
pub mod unpaywall;

pub use arxiv::ArxivProvider;
pub use biorxiv::BiorxivProvider;
pub use core::CoreProvider;
pub use crossref::CrossrefProvider;
pub use europe_pmc::EuropePmcProvider;
pub use gray_market::GrayMarketProvider;
pub use openalex::OpenAlexProvider;
pub use opencitations::OpenCitationsProvider;
pub use pmc::PmcProvider;
pub use pubmed::PubMedProvider;
pub use semantic_scholar::SemanticScholarProvider;
pub use traits::{
    ProviderError, ProviderResult, SearchContext, SearchQuery, SearchType, SourceProvider,
};
pub use unpaywall::UnpaywallProvider;
