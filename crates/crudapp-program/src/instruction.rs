use crudapp_types::Address;

use crate::codec::{instruction_discriminator, DataReader, DataWriter, MAX_MESSAGE_LEN};
use crate::descriptor::ProgramDescriptor;
use crate::error::{ProgramError, ProgramResult};
use crate::pda::{entry_address, MAX_SEED_LEN};

pub const CREATE_METHOD: &str = "create_journal_entry";
pub const UPDATE_METHOD: &str = "update_journal_entry";
pub const DELETE_METHOD: &str = "delete_journal_entry";

/// An account referenced by an instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountMeta {
    pub address: Address,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn writable(address: Address, is_signer: bool) -> Self {
        Self { address, is_signer, is_writable: true }
    }

    pub fn readonly(address: Address, is_signer: bool) -> Self {
        Self { address, is_signer, is_writable: false }
    }
}

/// A single program invocation ready to be placed in a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: Address,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// The three journal operations the program exposes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JournalInstruction {
    Create { title: String, message: String },
    Update { title: String, message: String },
    Delete { title: String },
}

impl JournalInstruction {
    pub fn create(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Create { title: title.into(), message: message.into() }
    }

    pub fn update(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Update { title: title.into(), message: message.into() }
    }

    pub fn delete(title: impl Into<String>) -> Self {
        Self::Delete { title: title.into() }
    }

    /// Method identifier as declared by the program descriptor.
    pub fn method(&self) -> &'static str {
        match self {
            Self::Create { .. } => CREATE_METHOD,
            Self::Update { .. } => UPDATE_METHOD,
            Self::Delete { .. } => DELETE_METHOD,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Create { title, .. } | Self::Update { title, .. } | Self::Delete { title } => title,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Create { message, .. } | Self::Update { message, .. } => Some(message),
            Self::Delete { .. } => None,
        }
    }

    /// Client-side checks mirroring what the program would reject anyway.
    pub fn validate(&self) -> ProgramResult<()> {
        let title_len = self.title().len();
        if title_len > MAX_SEED_LEN {
            return Err(ProgramError::SeedTooLong { len: title_len, max: MAX_SEED_LEN });
        }
        if let Some(message) = self.message() {
            if message.len() > MAX_MESSAGE_LEN {
                return Err(ProgramError::MessageTooLong {
                    len: message.len(),
                    max: MAX_MESSAGE_LEN,
                });
            }
        }
        Ok(())
    }

    fn encode_data(&self, discriminator: [u8; 8]) -> Vec<u8> {
        let writer = DataWriter::new(discriminator).string(self.title());
        match self.message() {
            Some(message) => writer.string(message).finish(),
            None => writer.finish(),
        }
    }

    fn arg_count(&self) -> usize {
        if self.message().is_some() {
            2
        } else {
            1
        }
    }

    /// Build the instruction `owner` signs to perform this operation against
    /// the deployment at `program`.
    pub fn build(
        &self,
        descriptor: &ProgramDescriptor,
        program: &Address,
        owner: &Address,
    ) -> ProgramResult<Instruction> {
        self.validate()?;
        let def = descriptor.instruction(self.method())?;
        if def.args.len() != self.arg_count() {
            return Err(ProgramError::InvalidDescriptor(format!(
                "{} declares {} args, expected {}",
                def.name,
                def.args.len(),
                self.arg_count()
            )));
        }

        let (entry, _bump) = entry_address(self.title(), owner, program)?;
        let accounts = def
            .accounts
            .iter()
            .map(|slot| {
                let address = match (slot.name.as_str(), slot.address.as_deref()) {
                    ("journal_entry", _) => entry,
                    ("owner", _) => *owner,
                    (_, Some(fixed)) => Address::from_base58(fixed).map_err(|e| {
                        ProgramError::InvalidAddress { value: fixed.to_string(), reason: e.to_string() }
                    })?,
                    (name, None) => {
                        return Err(ProgramError::InvalidDescriptor(format!(
                            "cannot resolve account slot {name}"
                        )))
                    }
                };
                Ok(AccountMeta { address, is_signer: slot.signer, is_writable: slot.writable })
            })
            .collect::<ProgramResult<Vec<_>>>()?;

        Ok(Instruction {
            program_id: *program,
            accounts,
            data: self.encode_data(def.discriminator),
        })
    }

    /// Decode instruction data as the program does when dispatching.
    pub fn decode(data: &[u8]) -> ProgramResult<Self> {
        let mut reader = DataReader::new(data);
        let discriminator = reader.discriminator()?;
        if discriminator == instruction_discriminator(CREATE_METHOD) {
            let title = reader.string()?;
            let message = reader.string()?;
            Ok(Self::Create { title, message })
        } else if discriminator == instruction_discriminator(UPDATE_METHOD) {
            let title = reader.string()?;
            let message = reader.string()?;
            Ok(Self::Update { title, message })
        } else if discriminator == instruction_discriminator(DELETE_METHOD) {
            let title = reader.string()?;
            Ok(Self::Delete { title })
        } else {
            Err(ProgramError::UnknownInstruction(hex::encode(discriminator)))
        }
    }
}
