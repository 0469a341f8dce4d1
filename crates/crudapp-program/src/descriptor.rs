//! The program descriptor (IDL) shipped with the client.
//!
//! The descriptor is the program's own statement of its address, method
//! identifiers, and account layouts. Instruction builders look method
//! discriminators up here rather than hardcoding them.

use serde::{Deserialize, Serialize};

use crudapp_types::Address;

use crate::error::{ProgramError, ProgramResult};

/// Descriptor generated by the program build and embedded at compile time.
const EMBEDDED_IDL: &str = include_str!("../idl/crudapp.json");

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramDescriptor {
    /// Address the program was deployed at when the descriptor was generated.
    #[serde(default)]
    pub address: Option<String>,
    pub metadata: DescriptorMetadata,
    #[serde(default)]
    pub instructions: Vec<InstructionDef>,
    #[serde(default)]
    pub accounts: Vec<AccountDef>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorMetadata {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionDef {
    pub name: String,
    pub discriminator: [u8; 8],
    #[serde(default)]
    pub accounts: Vec<AccountSlot>,
    #[serde(default)]
    pub args: Vec<ArgDef>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSlot {
    pub name: String,
    #[serde(default)]
    pub writable: bool,
    #[serde(default)]
    pub signer: bool,
    /// Fixed address, for slots such as the system program.
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDef {
    pub name: String,
    pub discriminator: [u8; 8],
}

impl ProgramDescriptor {
    /// The descriptor compiled into this crate.
    pub fn embedded() -> ProgramResult<Self> {
        Self::from_json(EMBEDDED_IDL)
    }

    pub fn from_json(json: &str) -> ProgramResult<Self> {
        serde_json::from_str(json).map_err(|e| ProgramError::InvalidDescriptor(e.to_string()))
    }

    /// The program identity embedded in the descriptor.
    ///
    /// A missing or blank address is an unconfigured descriptor and cannot be
    /// used to talk to any cluster.
    pub fn address(&self) -> ProgramResult<Address> {
        let raw = self
            .address
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ProgramError::UnconfiguredDescriptor)?;
        Address::from_base58(raw).map_err(|e| ProgramError::InvalidAddress {
            value: raw.to_string(),
            reason: e.to_string(),
        })
    }

    /// Copy of this descriptor pointed at a different deployment.
    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address.to_base58());
        self
    }

    pub fn instruction(&self, name: &str) -> ProgramResult<&InstructionDef> {
        self.instructions
            .iter()
            .find(|ix| ix.name == name)
            .ok_or_else(|| ProgramError::UnknownInstruction(name.to_string()))
    }

    pub fn account(&self, name: &str) -> ProgramResult<&AccountDef> {
        self.accounts
            .iter()
            .find(|acct| acct.name == name)
            .ok_or_else(|| ProgramError::InvalidDescriptor(format!("account type {name} not declared")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{account_discriminator, instruction_discriminator, ENTRY_ACCOUNT_NAME};

    #[test]
    fn embedded_descriptor_parses() {
        let desc = ProgramDescriptor::embedded().unwrap();
        assert_eq!(desc.metadata.name, "crudapp");
        assert_eq!(desc.instructions.len(), 3);
        assert_eq!(
            desc.address().unwrap().to_base58(),
            "HzpZsw5wNSSJjknUvgQGmHkoupPGJk4PummfhW5Q3KzV"
        );
    }

    #[test]
    fn declared_discriminators_match_method_names() {
        let desc = ProgramDescriptor::embedded().unwrap();
        for ix in &desc.instructions {
            assert_eq!(ix.discriminator, instruction_discriminator(&ix.name), "{}", ix.name);
        }
        let acct = desc.account(ENTRY_ACCOUNT_NAME).unwrap();
        assert_eq!(acct.discriminator, account_discriminator(ENTRY_ACCOUNT_NAME));
    }

    #[test]
    fn missing_address_is_unconfigured() {
        let desc = ProgramDescriptor::embedded().unwrap();
        let blank = ProgramDescriptor { address: Some("  ".into()), ..desc.clone() };
        assert_eq!(blank.address().unwrap_err(), ProgramError::UnconfiguredDescriptor);
        let none = ProgramDescriptor { address: None, ..desc };
        assert!(none.address().unwrap_err().is_resolution());
    }

    #[test]
    fn malformed_address_is_rejected() {
        let desc = ProgramDescriptor::embedded().unwrap();
        let bad = ProgramDescriptor { address: Some("not-base58!".into()), ..desc };
        assert!(matches!(bad.address().unwrap_err(), ProgramError::InvalidAddress { .. }));
    }

    #[test]
    fn with_address_overrides() {
        let other = Address::new([5; 32]);
        let desc = ProgramDescriptor::embedded().unwrap().with_address(other);
        assert_eq!(desc.address().unwrap(), other);
    }

    #[test]
    fn unknown_instruction_lookup_fails() {
        let desc = ProgramDescriptor::embedded().unwrap();
        assert_eq!(
            desc.instruction("UpdateJournalEntry").unwrap_err(),
            ProgramError::UnknownInstruction("UpdateJournalEntry".into())
        );
    }

    #[test]
    fn from_json_reports_parse_errors() {
        assert!(matches!(
            ProgramDescriptor::from_json("{").unwrap_err(),
            ProgramError::InvalidDescriptor(_)
        ));
    }
}
