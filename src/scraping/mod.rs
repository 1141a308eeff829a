pub mod browser_manager;
pub mod page;

pub use browser_manager::{BrowserSession, PageSource};
pub use page::{BrowserError, CdpPage, PageDriver};
