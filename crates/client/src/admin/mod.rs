pub mod panel;
pub mod poller;

pub use panel::{AdminConfig, AdminMount, AdminPanel, AdminSnapshot};
pub use poller::PollHandle;
