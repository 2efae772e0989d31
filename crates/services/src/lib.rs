pub mod chats;
pub mod completions;
pub mod proxy;
pub mod relay;
pub mod tokens;

pub use completions::{CompletionError, CompletionServiceImpl, CompletionServiceTrait};
pub use proxy::{ErrorEnvelope, ProxyError, ProxyRequest, ProxyService};
pub use relay::{RelayOutcome, StreamRelay};
