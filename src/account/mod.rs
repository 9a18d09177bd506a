mod tracker;

use std::fmt;

use ibc_proto::cosmos::auth::v1beta1::BaseAccount;

pub use tracker::{SequenceLease, SequenceTracker};

/// 账户编号与 sequence 的组合。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Account {
    pub number: AccountNumber,
    pub sequence: AccountSequence,
}

impl Account {
    pub fn new(number: u64, sequence: u64) -> Self {
        Self {
            number: AccountNumber::new(number),
            sequence: AccountSequence::new(sequence),
        }
    }
}

impl From<BaseAccount> for Account {
    fn from(value: BaseAccount) -> Self {
        Self::new(value.account_number, value.sequence)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountNumber(u64);

impl AccountNumber {
    pub fn new(number: u64) -> Self {
        Self(number)
    }

    pub fn to_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountSequence(u64);

impl AccountSequence {
    pub fn new(sequence: u64) -> Self {
        Self(sequence)
    }

    pub fn to_u64(self) -> u64 {
        self.0
    }

    pub fn increment(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    pub fn increment_mut(&mut self) {
        *self = self.increment();
    }
}

impl fmt::Display for AccountSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
