//! Shared sync indicator state.

/// Global sync indicator published by the session host.
///
/// `Syncing` is the "sync busy" flag: it holds while any remote transfer is
/// outstanding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    /// Credentials are incomplete; network operations are short-circuited.
    Offline,
    Idle,
    Syncing,
}
