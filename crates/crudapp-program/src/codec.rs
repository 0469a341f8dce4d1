//! Binary layout of instruction data and journal accounts.
//!
//! Layout: `[8 bytes discriminator][fields...]`, where strings are
//! `[u32 LE length][UTF-8 bytes]` and addresses are 32 raw bytes.
//! Account buffers are allocated at a fixed size, so decoders ignore
//! trailing bytes.

use sha2::{Digest, Sha256};

use crudapp_types::{Address, JournalEntry};

use crate::error::{ProgramError, ProgramResult};

/// Account type name of a journal entry.
pub const ENTRY_ACCOUNT_NAME: &str = "JournalEntryState";

/// Maximum title length stored in an entry account.
pub const MAX_TITLE_LEN: usize = 50;

/// Maximum message length stored in an entry account.
pub const MAX_MESSAGE_LEN: usize = 1000;

/// Allocated size of an entry account.
pub const ENTRY_ACCOUNT_SPACE: usize = 8 + 32 + (4 + MAX_TITLE_LEN) + (4 + MAX_MESSAGE_LEN);

pub fn instruction_discriminator(method: &str) -> [u8; 8] {
    namespaced_hash("global", method)
}

pub fn account_discriminator(account: &str) -> [u8; 8] {
    namespaced_hash("account", account)
}

fn namespaced_hash(namespace: &str, name: &str) -> [u8; 8] {
    let digest = Sha256::new()
        .chain_update(namespace.as_bytes())
        .chain_update(b":")
        .chain_update(name.as_bytes())
        .finalize();
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// Sequential encoder for discriminator-prefixed payloads.
#[derive(Debug)]
pub struct DataWriter {
    buf: Vec<u8>,
}

impl DataWriter {
    pub fn new(discriminator: [u8; 8]) -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&discriminator);
        Self { buf }
    }

    pub fn address(mut self, address: &Address) -> Self {
        self.buf.extend_from_slice(address.as_bytes());
        self
    }

    pub fn string(mut self, value: &str) -> Self {
        self.buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(value.as_bytes());
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Sequential decoder, the inverse of [`DataWriter`].
#[derive(Debug)]
pub struct DataReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> DataReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    fn take(&mut self, len: usize) -> ProgramResult<&'a [u8]> {
        let remaining = self.data.len() - self.offset;
        if remaining < len {
            return Err(ProgramError::UnexpectedEof {
                offset: self.offset,
                needed: len - remaining,
            });
        }
        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub fn discriminator(&mut self) -> ProgramResult<[u8; 8]> {
        let mut out = [0u8; 8];
        out.copy_from_slice(self.take(8)?);
        Ok(out)
    }

    /// Read a discriminator and require it to equal `expected`.
    pub fn expect_discriminator(&mut self, expected: [u8; 8]) -> ProgramResult<()> {
        let found = self.discriminator()?;
        if found != expected {
            return Err(ProgramError::DiscriminatorMismatch {
                expected: hex::encode(expected),
                found: hex::encode(found),
            });
        }
        Ok(())
    }

    pub fn address(&mut self) -> ProgramResult<Address> {
        let mut out = [0u8; 32];
        out.copy_from_slice(self.take(32)?);
        Ok(Address::new(out))
    }

    pub fn string(&mut self) -> ProgramResult<String> {
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(self.take(4)?);
        let len = u32::from_le_bytes(len_bytes) as usize;
        let start = self.offset;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ProgramError::InvalidUtf8(start))
    }
}

/// Encode an entry the way the program stores it, padded to the allocated size.
pub fn encode_entry(entry: &JournalEntry) -> Vec<u8> {
    let mut data = DataWriter::new(account_discriminator(ENTRY_ACCOUNT_NAME))
        .address(&entry.owner)
        .string(&entry.title)
        .string(&entry.message)
        .finish();
    if data.len() < ENTRY_ACCOUNT_SPACE {
        data.resize(ENTRY_ACCOUNT_SPACE, 0);
    }
    data
}

/// Decode raw account bytes into a [`JournalEntry`].
pub fn decode_entry(data: &[u8]) -> ProgramResult<JournalEntry> {
    let mut reader = DataReader::new(data);
    reader.expect_discriminator(account_discriminator(ENTRY_ACCOUNT_NAME))?;
    let owner = reader.address()?;
    let title = reader.string()?;
    let message = reader.string()?;
    Ok(JournalEntry { owner, title, message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminators_are_known_values() {
        assert_eq!(
            instruction_discriminator("create_journal_entry"),
            [48, 65, 201, 186, 25, 41, 127, 0]
        );
        assert_eq!(
            account_discriminator(ENTRY_ACCOUNT_NAME),
            [113, 86, 110, 124, 140, 14, 58, 66]
        );
    }

    #[test]
    fn strings_are_length_prefixed_little_endian() {
        let data = DataWriter::new([0; 8]).string("abc").finish();
        assert_eq!(&data[8..12], &[3, 0, 0, 0]);
        assert_eq!(&data[12..], b"abc");
    }

    #[test]
    fn entry_account_is_padded_and_decodes() {
        let entry = JournalEntry::new(Address::new([4; 32]), "title", "message body");
        let data = encode_entry(&entry);
        assert_eq!(data.len(), ENTRY_ACCOUNT_SPACE);
        assert_eq!(decode_entry(&data).unwrap(), entry);
    }

    #[test]
    fn wrong_discriminator_is_rejected() {
        let entry = JournalEntry::new(Address::new([4; 32]), "t", "m");
        let mut data = encode_entry(&entry);
        data[0] ^= 0xFF;
        let err = decode_entry(&data).unwrap_err();
        assert!(matches!(err, ProgramError::DiscriminatorMismatch { .. }));
        assert!(err.is_decode());
    }

    #[test]
    fn truncated_account_is_rejected() {
        let data = DataWriter::new(account_discriminator(ENTRY_ACCOUNT_NAME))
            .address(&Address::new([1; 32]))
            .string("title")
            .finish();
        // message length prefix is missing
        let err = decode_entry(&data).unwrap_err();
        assert_eq!(err, ProgramError::UnexpectedEof { offset: data.len(), needed: 4 });
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let mut data = DataWriter::new(account_discriminator(ENTRY_ACCOUNT_NAME))
            .address(&Address::new([1; 32]))
            .finish();
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&[0xC3, 0x28]);
        let err = decode_entry(&data).unwrap_err();
        assert_eq!(err, ProgramError::InvalidUtf8(44));
    }

    #[test]
    fn reader_tracks_offset() {
        let data = DataWriter::new([9; 8]).string("xy").finish();
        let mut reader = DataReader::new(&data);
        reader.expect_discriminator([9; 8]).unwrap();
        assert_eq!(reader.offset(), 8);
        assert_eq!(reader.string().unwrap(), "xy");
        assert_eq!(reader.offset(), data.len());
    }
}
