//! Program-derived addresses.
//!
//! An entry lives at the address derived from `[title, owner]` under the
//! program identity, so `(owner, title)` names at most one account.

use curve25519_dalek::edwards::CompressedEdwardsY;
use sha2::{Digest, Sha256};

use crudapp_types::Address;

use crate::error::{ProgramError, ProgramResult};

pub const MAX_SEED_LEN: usize = 32;
pub const MAX_SEEDS: usize = 16;

const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Derive the address for `seeds` under `program`.
///
/// Fails with [`ProgramError::OnCurve`] if the hash is a valid ed25519 point,
/// since such an address could have a private key.
pub fn create_program_address(seeds: &[&[u8]], program: &Address) -> ProgramResult<Address> {
    if seeds.len() > MAX_SEEDS {
        return Err(ProgramError::TooManySeeds(seeds.len()));
    }
    let mut hasher = Sha256::new();
    for seed in seeds {
        if seed.len() > MAX_SEED_LEN {
            return Err(ProgramError::SeedTooLong { len: seed.len(), max: MAX_SEED_LEN });
        }
        hasher.update(seed);
    }
    hasher.update(program.as_bytes());
    hasher.update(PDA_MARKER);

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hasher.finalize());
    if is_on_curve(&bytes) {
        return Err(ProgramError::OnCurve);
    }
    Ok(Address::new(bytes))
}

/// Find the first bump (from 255 down) whose derived address is off-curve.
pub fn find_program_address(seeds: &[&[u8]], program: &Address) -> ProgramResult<(Address, u8)> {
    if seeds.len() + 1 > MAX_SEEDS {
        return Err(ProgramError::TooManySeeds(seeds.len() + 1));
    }
    for bump in (0..=u8::MAX).rev() {
        let bump_seed = [bump];
        let mut with_bump: Vec<&[u8]> = seeds.to_vec();
        with_bump.push(&bump_seed);
        match create_program_address(&with_bump, program) {
            Ok(address) => return Ok((address, bump)),
            Err(ProgramError::OnCurve) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(ProgramError::NoViableBump)
}

/// Account address of the entry `title` owned by `owner`.
pub fn entry_address(title: &str, owner: &Address, program: &Address) -> ProgramResult<(Address, u8)> {
    find_program_address(&[title.as_bytes(), owner.as_bytes()], program)
}

fn is_on_curve(bytes: &[u8; 32]) -> bool {
    CompressedEdwardsY(*bytes).decompress().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor_program() -> Address {
        "HzpZsw5wNSSJjknUvgQGmHkoupPGJk4PummfhW5Q3KzV".parse().unwrap()
    }

    #[test]
    fn entry_address_known_vector() {
        let owner = Address::new([1; 32]);
        let (addr, bump) = entry_address("hello", &owner, &descriptor_program()).unwrap();
        assert_eq!(addr.to_base58(), "9kCKWyJfCMTUyzvYRiEfxFK7FLeLKHW4ZaRGQQVi26WW");
        assert_eq!(bump, 255);
    }

    #[test]
    fn bump_search_skips_on_curve_candidates() {
        let owner = Address::new([1; 32]);
        let program: Address = "kp4YQtM7eQuan71UQETzfASEN95Sd3qj65EQhu99kSG".parse().unwrap();
        let (addr, bump) = entry_address("hello", &owner, &program).unwrap();
        assert_eq!(addr.to_base58(), "5xgmPP34ZqmGsHxcLgMvpgwxPcM55iXHbBMZrCNnrWeu");
        assert_eq!(bump, 251);
    }

    #[test]
    fn empty_title_is_a_valid_seed() {
        let owner = Address::new([1; 32]);
        let (addr, _) = entry_address("", &owner, &descriptor_program()).unwrap();
        assert_eq!(addr.to_base58(), "3B9x8JphMMhndcJe7hBRFr94zzSnxtK4tkspV4rFo8Qj");
    }

    #[test]
    fn derived_address_is_off_curve() {
        let owner = Address::new([2; 32]);
        let (addr, bump) = entry_address("journal", &owner, &descriptor_program()).unwrap();
        assert!(!is_on_curve(addr.as_bytes()));
        let again = create_program_address(
            &[b"journal".as_slice(), owner.as_bytes(), &[bump]],
            &descriptor_program(),
        )
        .unwrap();
        assert_eq!(again, addr);
    }

    #[test]
    fn long_titles_cannot_be_seeds() {
        let owner = Address::new([1; 32]);
        let title = "x".repeat(MAX_SEED_LEN + 1);
        assert_eq!(
            entry_address(&title, &owner, &descriptor_program()).unwrap_err(),
            ProgramError::SeedTooLong { len: 33, max: 32 }
        );
    }

    #[test]
    fn distinct_owners_get_distinct_addresses() {
        let program = descriptor_program();
        let (a, _) = entry_address("same", &Address::new([1; 32]), &program).unwrap();
        let (b, _) = entry_address("same", &Address::new([2; 32]), &program).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn too_many_seeds_rejected() {
        let seeds: Vec<&[u8]> = vec![b"s".as_slice(); MAX_SEEDS];
        assert_eq!(
            find_program_address(&seeds, &descriptor_program()).unwrap_err(),
            ProgramError::TooManySeeds(MAX_SEEDS + 1)
        );
    }
}
