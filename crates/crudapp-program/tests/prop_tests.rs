use crudapp_program::{
    create_program_address, decode_entry, encode_entry, entry_address, JournalInstruction,
    MAX_MESSAGE_LEN, MAX_SEED_LEN,
};
use crudapp_types::{Address, JournalEntry};
use proptest::prelude::*;

proptest! {
    #[test]
    fn decoding_arbitrary_bytes_never_panics(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode_entry(&data);
        let _ = JournalInstruction::decode(&data);
    }

    #[test]
    fn entry_addresses_are_off_curve_and_reproducible(
        title in "[a-zA-Z0-9 ]{0,32}",
        owner in any::<[u8; 32]>(),
        program in any::<[u8; 32]>(),
    ) {
        let owner = Address::new(owner);
        let program = Address::new(program);
        let (address, bump) = entry_address(&title, &owner, &program).unwrap();
        let rebuilt = create_program_address(&[title.as_bytes(), owner.as_bytes().as_slice(), &[bump][..]], &program).unwrap();
        prop_assert_eq!(rebuilt, address);
    }

    #[test]
    fn titles_over_seed_limit_are_rejected(extra in 1usize..16) {
        let title = "x".repeat(MAX_SEED_LEN + extra);
        prop_assert!(entry_address(&title, &Address::new([1; 32]), &Address::new([2; 32])).is_err());
    }

    #[test]
    fn stored_entries_decode_despite_padding(
        title in "[a-z]{0,32}",
        message in proptest::collection::vec(any::<char>(), 0..64),
    ) {
        let message: String = message.into_iter().collect();
        prop_assume!(message.len() <= MAX_MESSAGE_LEN);
        let entry = JournalEntry::new(Address::new([7; 32]), title, message);
        prop_assert_eq!(decode_entry(&encode_entry(&entry)).unwrap(), entry);
    }
}
