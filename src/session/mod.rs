/// Session security core
///
/// Token issuance, the Redis-backed session records, TTL-driven forced logout
/// and refresh-token theft detection.

pub mod codec;
pub mod dispatcher;
pub mod keys;
pub mod notifier;
pub mod service;
pub mod store;

pub use codec::{Claims, Principal, TokenCodec, TokenFailure, TokenKind, TokenPair};
pub use dispatcher::{ForcedLogoutPort, HttpLogoutPort, LogoutDispatcher};
pub use notifier::{dispatch_command, ExpirationNotifier, ForcedLogout, NotifierState};
pub use service::{LoginOutcome, LoginSession, LogoutOutcome, ReissueOutcome, SessionService};
pub use store::{ExpirationSource, MemorySessionStore, RedisSessionStore, SessionStore};
