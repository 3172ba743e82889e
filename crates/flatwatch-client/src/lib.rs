pub mod cleaner;
pub mod fetcher;
pub mod notifier;

pub use cleaner::HtmlTextCleaner;
pub use fetcher::ReqwestFetcher;
pub use notifier::{MailNotifier, MailTransport};
