pub mod aiml;
pub mod edgar;
pub mod resolver;

pub use aiml::{build_arxiv_query, build_model_params, AiMlScraper};
pub use edgar::EdgarScraper;
pub use resolver::{
    EntityQuery, EntityResolver, ResolutionStrategy, ResolvedEntity, TickerCache, TickerTable,
};
