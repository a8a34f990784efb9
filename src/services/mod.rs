pub mod browser_session;
pub mod mailer;
pub mod page_fetcher;
pub mod parcel_resolver;


pub use browser_session::*;
pub use mailer::*;
pub use page_fetcher::*;
pub use parcel_resolver::*;
