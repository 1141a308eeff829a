pub mod feed;
pub mod io;
pub mod redirect;
pub mod resolve;
pub mod search;

pub use feed::FeedExtractor;
pub use io::{load_entities, save_json, DataError};
pub use redirect::RedirectResolver;
pub use resolve::{run_with_browser, ResolutionOrchestrator};
pub use search::{ExclusionList, ProviderSet, SearchProvider};
