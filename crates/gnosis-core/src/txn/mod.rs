//! Transaction Manager.
//!
//! Stages operations against a cloned graph, backs up the persisted state
//! before committing, and restores that backup if anything in the commit
//! phase fails. Grounded on the teacher's ordered, checked-step discipline
//! in `storage/migrations.rs` and on its `StorageError` propagation habit;
//! unlike the teacher's blocking `Mutex<Connection>`, the single-active-
//! transaction constraint here is enforced with a `tokio::sync::Mutex`
//! guarded state machine so commit phases remain cancellable between
//! `.await` points.

use crate::error::{Error, Result};
use crate::events::ChangeEvent;
use crate::graph::store::{EntityPatch, Graph, GraphStore};
use crate::graph::{Entity, Relation};
use crate::storage::backup;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// One staged mutation, recorded in the order it was staged.
#[derive(Debug, Clone)]
pub enum Operation {
    CreateEntity(Entity),
    UpdateEntity { name: String, patch: EntityPatch },
    DeleteEntity(String),
    CreateRelation(Relation),
    DeleteRelation {
        from: String,
        to: String,
        relation_type: String,
    },
}

/// Transaction lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Idle,
    Active,
    Committing,
    RollingBack,
}

/// Options for [`TransactionManager::commit_batch`].
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub stop_on_error: bool,
    pub validate_before_execute: bool,
}

/// Outcome of one operation within a batch commit.
#[derive(Debug, Clone)]
pub struct OperationOutcome {
    pub index: usize,
    pub result: std::result::Result<(), String>,
}

/// Aggregate result of [`TransactionManager::commit_batch`].
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub outcomes: Vec<OperationOutcome>,
    pub succeeded: usize,
    pub failed: usize,
    /// `false` if any operation in the batch failed.
    pub success: bool,
    /// Summary naming the failure count and the index of the first
    /// failure, present whenever `success` is `false`.
    pub error_message: Option<String>,
}

/// Build the `{count, first failure index}` summary message for a batch
/// with at least one failed operation.
fn batch_error_message(outcomes: &[OperationOutcome], failed: usize, total: usize) -> Option<String> {
    let first = outcomes.iter().find(|o| o.result.is_err())?;
    let Err(msg) = &first.result else { return None };
    Some(format!(
        "{failed} of {total} operations failed; first failure at index {}: {msg}",
        first.index
    ))
}

struct Inner {
    state: TxnState,
    staged: Vec<Operation>,
}

/// Coordinates staged mutations against a [`GraphStore`], enforcing that
/// at most one transaction is Active at a time.
pub struct TransactionManager {
    store: Arc<GraphStore>,
    backups_dir: PathBuf,
    inner: Mutex<Inner>,
    cancelled: AtomicBool,
}

impl TransactionManager {
    pub fn new(store: Arc<GraphStore>, backups_dir: PathBuf) -> Self {
        Self {
            store,
            backups_dir,
            inner: Mutex::new(Inner {
                state: TxnState::Idle,
                staged: Vec::new(),
            }),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Signal cancellation; checked at each commit-phase checkpoint.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancelled.swap(false, Ordering::AcqRel) {
            return Err(Error::OperationCancelled);
        }
        Ok(())
    }

    /// Begin a transaction. Fails if one is already Active.
    pub async fn begin(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != TxnState::Idle {
            return Err(Error::TransactionActive);
        }
        inner.state = TxnState::Active;
        inner.staged.clear();
        Ok(())
    }

    /// Stage an operation. Rejected once the transaction has left Active.
    pub async fn stage(&self, op: Operation) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != TxnState::Active {
            return Err(Error::NoTransaction);
        }
        inner.staged.push(op);
        Ok(())
    }

    /// Apply one staged operation to `graph`, returning the event(s) it
    /// produced.
    fn apply(graph: &mut Graph, op: &Operation) -> Result<Vec<ChangeEvent>> {
        match op {
            Operation::CreateEntity(entity) => Ok(vec![graph.insert_entity(entity.clone())?]),
            Operation::UpdateEntity { name, patch } => {
                Ok(vec![graph.update_entity(name, patch)?])
            }
            Operation::DeleteEntity(name) => graph.delete_entity(name),
            Operation::CreateRelation(relation) => {
                Ok(vec![graph.insert_relation(relation.clone())?])
            }
            Operation::DeleteRelation {
                from,
                to,
                relation_type,
            } => Ok(vec![graph.delete_relation(from, to, relation_type)?]),
        }
    }

    /// Commit phases:
    /// (a) backup current persisted state, (b) clone graph, (c) apply
    /// staged ops in order, (d) persist, (e) delete backup, (f) emit
    /// events. Any failure restores the backup; if the restore itself
    /// fails, the backup is retained and `ManualRecoveryRequired` is
    /// returned.
    pub async fn commit(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != TxnState::Active {
            return Err(Error::NoTransaction);
        }
        inner.state = TxnState::Committing;
        let staged = std::mem::take(&mut inner.staged);
        drop(inner);

        let result = self.run_commit(&staged).await;

        let mut inner = self.inner.lock().await;
        inner.state = TxnState::Idle;
        result
    }

    async fn run_commit(&self, staged: &[Operation]) -> Result<()> {
        self.check_cancelled()?;

        let path = self.store.path().to_path_buf();
        let pre_graph = self.store.get_graph_for_mutation();
        let backup_meta = backup::create_backup(
            &path,
            &self.backups_dir,
            Some("pre-commit".to_string()),
            pre_graph.entities.len(),
            pre_graph.relations.len(),
        )?;

        self.check_cancelled()?;

        let mut mutated = pre_graph;
        let mut events = Vec::new();
        for op in staged {
            match Self::apply(&mut mutated, op) {
                Ok(mut produced) => events.append(&mut produced),
                Err(e) => {
                    return self.abort(&backup_meta, &path, e).await;
                }
            }
        }

        self.check_cancelled()?;

        if let Err(e) = self.store.commit_mutated_graph(mutated, events) {
            return self.abort(&backup_meta, &path, e).await;
        }

        let _ = backup::delete_backup(&backup_meta);

        Ok(())
    }

    async fn abort(
        &self,
        backup_meta: &backup::BackupMetadata,
        path: &std::path::Path,
        cause: Error,
    ) -> Result<()> {
        match backup::restore_backup(backup_meta, path) {
            Ok(()) => {
                let _ = self.store.load();
                Err(cause)
            }
            Err(_restore_err) => Err(Error::ManualRecoveryRequired {
                backup_path: backup_meta.payload_path.clone(),
            }),
        }
    }

    /// Roll back explicitly without attempting a commit: discards staged
    /// operations and returns to Idle.
    pub async fn rollback(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != TxnState::Active {
            return Err(Error::NoTransaction);
        }
        inner.state = TxnState::RollingBack;
        inner.staged.clear();
        inner.state = TxnState::Idle;
        Ok(())
    }

    pub async fn state(&self) -> TxnState {
        self.inner.lock().await.state
    }

    /// Batch variant: begin, stage all, commit, in one call. `validate_before_execute` simulates the
    /// batch against a pending-create/pending-delete set first and
    /// reports the first violation with its index; otherwise every
    /// operation is attempted and per-operation results are collected.
    pub async fn commit_batch(
        &self,
        ops: Vec<Operation>,
        options: BatchOptions,
    ) -> Result<BatchReport> {
        if options.validate_before_execute {
            if let Err((index, err)) = self.validate_batch(&ops) {
                let outcomes = vec![OperationOutcome {
                    index,
                    result: Err(err.to_string()),
                }];
                let error_message = batch_error_message(&outcomes, 1, ops.len());
                return Ok(BatchReport {
                    outcomes,
                    succeeded: 0,
                    failed: 1,
                    success: false,
                    error_message,
                });
            }
        }

        self.begin().await?;
        let path = self.store.path().to_path_buf();
        let pre_graph = self.store.get_graph_for_mutation();
        let backup_meta = backup::create_backup(
            &path,
            &self.backups_dir,
            Some("pre-batch".to_string()),
            pre_graph.entities.len(),
            pre_graph.relations.len(),
        )?;

        let mut mutated = pre_graph;
        let mut events = Vec::new();
        let mut outcomes = Vec::with_capacity(ops.len());
        let mut failed = 0;

        for (index, op) in ops.iter().enumerate() {
            match Self::apply(&mut mutated, op) {
                Ok(mut produced) => {
                    events.append(&mut produced);
                    outcomes.push(OperationOutcome {
                        index,
                        result: Ok(()),
                    });
                }
                Err(e) => {
                    failed += 1;
                    outcomes.push(OperationOutcome {
                        index,
                        result: Err(e.to_string()),
                    });
                    if options.stop_on_error {
                        break;
                    }
                }
            }
        }

        let succeeded = outcomes.len() - failed;
        if let Err(e) = self.store.commit_mutated_graph(mutated, events) {
            let _ = self.abort(&backup_meta, &path, e).await;
            self.rollback().await?;
            return Err(Error::StorageFailure(
                "batch commit failed after staging; rolled back".to_string(),
            ));
        }
        let _ = backup::delete_backup(&backup_meta);

        let mut inner = self.inner.lock().await;
        inner.state = TxnState::Idle;
        inner.staged.clear();
        drop(inner);

        let total = outcomes.len();
        let error_message = batch_error_message(&outcomes, failed, total);

        Ok(BatchReport {
            success: failed == 0,
            error_message,
            outcomes,
            succeeded,
            failed,
        })
    }

    /// Simulate the batch in isolation (pending-create/pending-delete
    /// sets, no persistence) and return the first violation's index.
    fn validate_batch(&self, ops: &[Operation]) -> std::result::Result<(), (usize, Error)> {
        let mut sim = self.store.get_graph_for_mutation();
        for (index, op) in ops.iter().enumerate() {
            if let Err(e) = Self::apply(&mut sim, op) {
                return Err((index, e));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::store::GraphStoreConfig;
    use tempfile::tempdir;

    fn temp_manager() -> (TransactionManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.jsonl");
        let store = Arc::new(GraphStore::open(GraphStoreConfig { path }).unwrap());
        let backups_dir = dir.path().join("backups");
        (TransactionManager::new(store, backups_dir), dir)
    }

    #[tokio::test]
    async fn commit_applies_staged_operations() {
        let (txn, _dir) = temp_manager();
        txn.begin().await.unwrap();
        txn.stage(Operation::CreateEntity(Entity::new("Alice", "person")))
            .await
            .unwrap();
        txn.commit().await.unwrap();
        assert_eq!(txn.state().await, TxnState::Idle);
    }

    #[tokio::test]
    async fn second_begin_while_active_fails() {
        let (txn, _dir) = temp_manager();
        txn.begin().await.unwrap();
        let err = txn.begin().await.unwrap_err();
        assert!(matches!(err, Error::TransactionActive));
    }

    #[tokio::test]
    async fn failed_operation_rolls_back_all_staged_changes() {
        let (txn, _dir) = temp_manager();
        txn.begin().await.unwrap();
        txn.stage(Operation::CreateEntity(Entity::new("Alice", "person")))
            .await
            .unwrap();
        txn.stage(Operation::CreateEntity(Entity::new("Alice", "person")))
            .await
            .unwrap();
        let err = txn.commit().await.unwrap_err();
        assert!(matches!(err, Error::DuplicateEntity(_)));
        assert_eq!(txn.state().await, TxnState::Idle);
    }

    #[tokio::test]
    async fn batch_validate_before_execute_reports_first_violation() {
        let (txn, _dir) = temp_manager();
        let ops = vec![
            Operation::CreateEntity(Entity::new("Alice", "person")),
            Operation::CreateEntity(Entity::new("Alice", "person")),
        ];
        let report = txn
            .commit_batch(
                ops,
                BatchOptions {
                    stop_on_error: false,
                    validate_before_execute: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.outcomes[0].index, 1);
    }
}
