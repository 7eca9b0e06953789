//! Transaction operations.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::{EntityPath, NodePath};

/// One recorded mutation.
///
/// `Put` always targets a whole leaf, so its path is a [`NodePath`].
/// `Delete` and `Update` may reach inside a stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransactionOperation {
    Put { path: NodePath, value: Value },
    Delete { path: EntityPath },
    Update { path: EntityPath, value: Value },
}

impl TransactionOperation {
    /// Location touched by this operation.
    #[must_use]
    pub fn target(&self) -> EntityPath {
        match self {
            Self::Put { path, .. } => path.to_entity_path(),
            Self::Delete { path } | Self::Update { path, .. } => path.clone(),
        }
    }

    /// Short name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Put { .. } => "put",
            Self::Delete { .. } => "delete",
            Self::Update { .. } => "update",
        }
    }
}

/// Ordered, sealed list of operations handed to a storage engine.
///
/// Later operations on the same path supersede earlier ones when applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transaction {
    operations: Vec<TransactionOperation>,
}

impl Transaction {
    /// Wraps already validated operations.
    #[must_use]
    pub fn new(operations: Vec<TransactionOperation>) -> Self {
        Self { operations }
    }

    /// Operations in application order.
    #[must_use]
    pub fn operations(&self) -> &[TransactionOperation] {
        &self.operations
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// True if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Distinct paths touched, in first-touch order.
    #[must_use]
    pub fn touched_paths(&self) -> Vec<EntityPath> {
        let mut out: Vec<EntityPath> = Vec::with_capacity(self.operations.len());
        for op in &self.operations {
            let target = op.target();
            if !out.contains(&target) {
                out.push(target);
            }
        }
        out
    }
}

impl IntoIterator for Transaction {
    type Item = TransactionOperation;
    type IntoIter = std::vec::IntoIter<TransactionOperation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operations_are_tagged_on_the_wire() {
        let op = TransactionOperation::Put {
            path: NodePath::parse("a/b").unwrap(),
            value: json!(1),
        };
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"type": "put", "path": ["a", "b"], "value": 1})
        );

        let op = TransactionOperation::Delete {
            path: EntityPath::parse("list/0").unwrap(),
        };
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"type": "delete", "path": ["list", 0]})
        );
    }

    #[test]
    fn put_with_numeric_path_fails_to_decode() {
        let raw = json!([{"type": "put", "path": ["list", 0], "value": 1}]);
        let decoded: Result<Transaction, _> = serde_json::from_value(raw);
        assert!(decoded.is_err());
    }

    #[test]
    fn touched_paths_are_deduplicated() {
        let a = NodePath::parse("a").unwrap();
        let tx = Transaction::new(vec![
            TransactionOperation::Put { path: a.clone(), value: json!(1) },
            TransactionOperation::Update { path: a.to_entity_path(), value: json!(2) },
            TransactionOperation::Delete { path: EntityPath::parse("b/1").unwrap() },
        ]);
        assert_eq!(tx.touched_paths(), vec![a.to_entity_path(), EntityPath::parse("b/1").unwrap()]);
    }
}
