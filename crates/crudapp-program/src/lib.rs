//! Program-side knowledge for the crudapp journal client.
//!
//! This crate knows what the deployed journal program looks like from the
//! outside. It provides:
//! - [`ProgramDescriptor`], the embedded IDL with the program's default address
//! - Discriminators and the binary codec for instruction data and accounts
//! - [`JournalInstruction`] builders for create/update/delete
//! - Program-derived entry addresses

pub mod codec;
pub mod descriptor;
pub mod error;
pub mod instruction;
pub mod pda;

pub use codec::{
    account_discriminator, decode_entry, encode_entry, instruction_discriminator,
    ENTRY_ACCOUNT_NAME, ENTRY_ACCOUNT_SPACE, MAX_MESSAGE_LEN, MAX_TITLE_LEN,
};
pub use descriptor::{AccountDef, AccountSlot, ArgDef, InstructionDef, ProgramDescriptor};
pub use error::{ProgramError, ProgramResult};
pub use instruction::{AccountMeta, Instruction, JournalInstruction};
pub use pda::{create_program_address, entry_address, find_program_address, MAX_SEED_LEN};
