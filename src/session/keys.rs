/// Session store key layout
///
/// Keys are `{ACTION}:{owner}`; the LOGOUT action additionally carries a
/// `:session` suffix, which is how expiry events for session markers are told
/// apart from every other expiring key.
use std::fmt;

/// Suffix appended to logout marker keys
pub const SESSION_SUFFIX: &str = "session";

/// Record classes kept in the session store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreAction {
    /// Logout marker; its expiry triggers a forced logout
    Logout,
    /// Last refresh token issued to a user
    Refresh,
    /// Revoked access token, keyed by the token itself
    Blacklist,
}

impl StoreAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreAction::Logout => "LOGOUT",
            StoreAction::Refresh => "REFRESH",
            StoreAction::Blacklist => "BLACKLIST",
        }
    }
}

impl fmt::Display for StoreAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the full key for a record
pub fn compose_key(action: StoreAction, owner: &str) -> String {
    match action {
        StoreAction::Logout => format!("{}:{}:{}", action, owner, SESSION_SUFFIX),
        _ => format!("{}:{}", action, owner),
    }
}

/// A key split back into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey<'a> {
    pub prefix: &'a str,
    pub owner: &'a str,
    pub suffix: Option<&'a str>,
}

impl ParsedKey<'_> {
    /// Whether this key is a logout marker
    pub fn is_session_marker(&self) -> bool {
        self.prefix == StoreAction::Logout.as_str() && self.suffix == Some(SESSION_SUFFIX)
    }
}

/// Split a key on `:` into prefix, owner and optional suffix.
///
/// Anything past the third segment is ignored; a key without an owner
/// segment does not parse.
pub fn parse_key(key: &str) -> Option<ParsedKey<'_>> {
    let mut parts = key.split(':');
    let prefix = parts.next()?;
    let owner = parts.next()?;
    let suffix = parts.next();

    Some(ParsedKey {
        prefix,
        owner,
        suffix,
    })
}
