use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::error::{CompassError, CompassResult};
use crate::keyring::SigningIdentity;
use crate::transport::Transport;

use super::{Account, AccountSequence};

type Slot = Arc<Mutex<Option<Account>>>;

/// 每个签名身份一把锁，锁内缓存该身份的账户编号与 sequence。
///
/// 同一身份同一时刻只有一个 [`SequenceLease`]，不同身份互不阻塞。
#[derive(Default)]
pub struct SequenceTracker {
    slots: DashMap<String, Slot>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, name: &str) -> Slot {
        // 先克隆 Arc 再 await，避免持有 DashMap 分片锁跨越 await 点
        self.slots
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .value()
            .clone()
    }

    /// 进入该身份的临界区，直到返回的 lease 被 drop。
    pub async fn lease(&self, identity: &SigningIdentity) -> SequenceLease {
        let slot = self.slot(&identity.name);
        let guard = slot.lock_owned().await;
        debug!(
            target: "compass::account",
            identity = %identity.name,
            cached = guard.is_some(),
            "sequence lease acquired"
        );
        SequenceLease {
            identity: identity.clone(),
            guard,
            prepared: None,
        }
    }

    /// 读取缓存的账户信息；若该身份正被占用则等待。
    pub async fn cached(&self, name: &str) -> Option<Account> {
        let slot = self.slots.get(name).map(|entry| entry.value().clone())?;
        let guard = slot.lock().await;
        *guard
    }
}

/// 单个身份的独占租约：prepare 取号，commit 在节点接受交易后推进 sequence。
pub struct SequenceLease {
    identity: SigningIdentity,
    guard: OwnedMutexGuard<Option<Account>>,
    prepared: Option<Account>,
}

impl SequenceLease {
    pub fn identity(&self) -> &SigningIdentity {
        &self.identity
    }

    /// 返回下一笔交易应使用的账户编号与 sequence，首次使用或缓存失效时向节点查询。
    pub async fn prepare(&mut self, transport: &dyn Transport) -> CompassResult<Account> {
        let account = match *self.guard {
            Some(account) => account,
            None => {
                let fetched = transport
                    .query_account(&self.identity.address)
                    .await
                    .map_err(|source| CompassError::AccountLookupFailed {
                        address: self.identity.address.clone(),
                        source,
                    })?;
                info!(
                    target: "compass::account",
                    identity = %self.identity.name,
                    address = %self.identity.address,
                    account_number = %fetched.number,
                    sequence = %fetched.sequence,
                    "account refreshed from node"
                );
                *self.guard = Some(fetched);
                fetched
            }
        };
        self.prepared = Some(account);
        Ok(account)
    }

    /// 节点 mempool 接受交易后调用，缓存的 sequence 加一。
    pub fn commit(&mut self) -> CompassResult<AccountSequence> {
        let prepared = self
            .prepared
            .take()
            .ok_or_else(|| CompassError::invariant("commit called without a prepared account"))?;
        let next = prepared.sequence.increment();
        *self.guard = Some(Account {
            number: prepared.number,
            sequence: next,
        });
        debug!(
            target: "compass::account",
            identity = %self.identity.name,
            used = %prepared.sequence,
            next = %next,
            "sequence advanced"
        );
        Ok(next)
    }

    /// 丢弃缓存，下一次 prepare 重新向节点查询。
    pub fn invalidate(&mut self) {
        if self.guard.take().is_some() {
            info!(
                target: "compass::account",
                identity = %self.identity.name,
                "cached account invalidated"
            );
        }
        self.prepared = None;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_support::{MockTransport, identity};

    #[tokio::test]
    async fn fetches_account_once_and_reuses_cache() {
        let transport = MockTransport::new(Account::new(3, 10));
        let tracker = SequenceTracker::new();
        let alice = identity("alice");

        let mut lease = tracker.lease(&alice).await;
        assert_eq!(lease.prepare(&transport).await.unwrap(), Account::new(3, 10));
        drop(lease);

        let mut lease = tracker.lease(&alice).await;
        assert_eq!(lease.prepare(&transport).await.unwrap(), Account::new(3, 10));
        assert_eq!(transport.account_queries(), 1);
    }

    #[tokio::test]
    async fn commit_advances_cached_sequence() {
        let transport = MockTransport::new(Account::new(3, 10));
        let tracker = SequenceTracker::new();
        let alice = identity("alice");

        let mut lease = tracker.lease(&alice).await;
        lease.prepare(&transport).await.unwrap();
        assert_eq!(lease.commit().unwrap(), AccountSequence::new(11));
        drop(lease);

        assert_eq!(tracker.cached("alice").await, Some(Account::new(3, 11)));
    }

    #[tokio::test]
    async fn commit_without_prepare_is_an_invariant_violation() {
        let tracker = SequenceTracker::new();
        let mut lease = tracker.lease(&identity("alice")).await;
        let err = lease.commit().unwrap_err();
        assert!(matches!(err, CompassError::InternalInvariantViolation(_)));
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let transport = MockTransport::new(Account::new(3, 10));
        let tracker = SequenceTracker::new();
        let alice = identity("alice");

        let mut lease = tracker.lease(&alice).await;
        lease.prepare(&transport).await.unwrap();
        lease.invalidate();
        transport.set_account(Account::new(3, 17));
        assert_eq!(lease.prepare(&transport).await.unwrap(), Account::new(3, 17));
        assert_eq!(transport.account_queries(), 2);
    }

    #[tokio::test]
    async fn lookup_failure_is_reported_and_not_cached() {
        let transport = MockTransport::new(Account::new(3, 10));
        transport.fail_account_queries(true);
        let tracker = SequenceTracker::new();
        let alice = identity("alice");

        let mut lease = tracker.lease(&alice).await;
        let err = lease.prepare(&transport).await.unwrap_err();
        assert!(matches!(err, CompassError::AccountLookupFailed { .. }));
        drop(lease);
        assert_eq!(tracker.cached("alice").await, None);
    }

    #[tokio::test]
    async fn distinct_identities_do_not_block_each_other() {
        let tracker = SequenceTracker::new();
        let _alice = tracker.lease(&identity("alice")).await;

        let bob = tokio::time::timeout(Duration::from_secs(1), tracker.lease(&identity("bob"))).await;
        assert!(bob.is_ok());

        let alice_again =
            tokio::time::timeout(Duration::from_millis(50), tracker.lease(&identity("alice"))).await;
        assert!(alice_again.is_err());
    }
}
