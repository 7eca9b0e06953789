//! Path subscriptions.
//!
//! A [`NodeLookupTrie`] indexes the subscribed paths; the registry matches
//! each committed change against it and pushes [`ChangeEvent`]s to the
//! matching [`Subscription`] streams.

mod registry;
mod stream;
/// Leaf/branch trie over subscribed node paths.
pub mod trie;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::NodePath;

pub use registry::{SubscriptionId, SubscriptionRegistry};
pub use stream::Subscription;
pub use trie::{LeafMatch, NodeLookupTrie};

/// Current value of a subscribed path after a commit touched it.
///
/// `value` is `null` when nothing is stored there anymore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub path: NodePath,
    pub value: Value,
}
