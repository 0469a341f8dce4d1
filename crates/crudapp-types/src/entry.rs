use serde::{Deserialize, Serialize};

use crate::address::Address;

/// Decoded state of a journal account.
///
/// `title` identifies the entry for its `owner`; both are fixed at creation.
/// Only `message` changes afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JournalEntry {
    pub owner: Address,
    pub title: String,
    pub message: String,
}

impl JournalEntry {
    pub fn new(owner: Address, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            owner,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// An account address paired with its decoded contents.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgramAccount<T> {
    pub address: Address,
    pub account: T,
}

impl<T> ProgramAccount<T> {
    pub fn new(address: Address, account: T) -> Self {
        Self { address, account }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_constructor() {
        let owner = Address::new([3; 32]);
        let entry = JournalEntry::new(owner, "day one", "hello");
        assert_eq!(entry.owner, owner);
        assert_eq!(entry.title, "day one");
        assert_eq!(entry.message, "hello");
    }

    #[test]
    fn program_account_serializes_address_as_base58() {
        let account = ProgramAccount::new(
            Address::system_program(),
            JournalEntry::new(Address::system_program(), "t", "m"),
        );
        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["address"], "11111111111111111111111111111111");
        assert_eq!(json["account"]["title"], "t");
    }
}
