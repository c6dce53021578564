use core::fmt;
use rand::{CryptoRng, RngCore};

use crate::error::{PoolError, Result};
use crate::field::FieldElement;
use crate::poseidon;

const PREFIX: &str = "light-";
const PREIMAGE_HEX_LEN: usize = 128;

/// A single-asset deposit note, shareable as
/// `light-<currency>-<amount>-0x<nullifier || secret as 128 hex chars>`.
///
///   commitment     = Poseidon(nullifier, secret)
///   nullifier_hash = Poseidon(nullifier)
///
/// Both 32-byte values are read little-endian and reduced into the field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepositNote {
    pub currency: String,
    pub amount: String,
    pub nullifier: [u8; 32],
    pub secret: [u8; 32],
}

impl DepositNote {
    /// Random nullifier and secret of 31 bytes each, so neither wraps the field.
    pub fn generate<R: RngCore + CryptoRng + ?Sized>(
        currency: &str,
        amount: &str,
        rng: &mut R,
    ) -> Result<Self> {
        if !is_currency(currency) || !is_amount(amount) {
            return Err(PoolError::InvalidNoteFormat);
        }
        let mut nullifier = [0u8; 32];
        let mut secret = [0u8; 32];
        rng.fill_bytes(&mut nullifier[..31]);
        rng.fill_bytes(&mut secret[..31]);
        Ok(DepositNote {
            currency: currency.to_string(),
            amount: amount.to_string(),
            nullifier,
            secret,
        })
    }

    /// Finds the first well-formed note anywhere in `input`.
    pub fn parse(input: &str) -> Result<Self> {
        input
            .match_indices(PREFIX)
            .find_map(|(start, _)| parse_at(&input[start + PREFIX.len()..]))
            .ok_or(PoolError::InvalidNoteFormat)
    }

    pub fn preimage(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.nullifier);
        out[32..].copy_from_slice(&self.secret);
        out
    }

    pub fn commitment(&self) -> Result<FieldElement> {
        poseidon::hash2(
            &FieldElement::from_le_bytes_mod_order(&self.nullifier),
            &FieldElement::from_le_bytes_mod_order(&self.secret),
        )
    }

    pub fn nullifier_hash(&self) -> Result<FieldElement> {
        poseidon::hash(&[FieldElement::from_le_bytes_mod_order(&self.nullifier)])
    }
}

impl fmt::Display for DepositNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PREFIX}{}-{}-0x{}",
            self.currency,
            self.amount,
            hex::encode(self.preimage())
        )
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_currency(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_word_char)
}

fn is_amount(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// `<currency>-<amount>-0x<128 hex>` at the start of `rest`; trailing text is ignored.
fn parse_at(rest: &str) -> Option<DepositNote> {
    let currency_len = rest.find(|c: char| !is_word_char(c)).unwrap_or(rest.len());
    let (currency, rest) = rest.split_at(currency_len);
    let rest = rest.strip_prefix('-')?;

    let amount_len = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    let (amount, rest) = rest.split_at(amount_len);
    let rest = rest.strip_prefix("-0x")?;

    if !is_currency(currency) || !is_amount(amount) {
        return None;
    }
    let hex_part = rest.get(..PREIMAGE_HEX_LEN)?;
    let bytes = hex::decode(hex_part).ok()?;
    let mut nullifier = [0u8; 32];
    let mut secret = [0u8; 32];
    nullifier.copy_from_slice(&bytes[..32]);
    secret.copy_from_slice(&bytes[32..]);
    Some(DepositNote {
        currency: currency.to_string(),
        amount: amount.to_string(),
        nullifier,
        secret,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample_hex() -> String {
        let mut s = String::new();
        for i in 0..64u8 {
            s.push_str(&format!("{:02x}", i));
        }
        s
    }

    #[test]
    fn test_parse_extracts_fields() {
        let note = DepositNote::parse(&format!("light-SOL-1.5-0x{}", sample_hex())).unwrap();
        assert_eq!(note.currency, "SOL");
        assert_eq!(note.amount, "1.5");
        assert_eq!(note.nullifier[0], 0);
        assert_eq!(note.nullifier[31], 31);
        assert_eq!(note.secret[0], 32);
    }

    #[test]
    fn test_parse_finds_note_inside_text() {
        let text = format!("your note: light-x-oops light-SOL-2-0x{}!!", sample_hex());
        let note = DepositNote::parse(&text).unwrap();
        assert_eq!(note.amount, "2");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "".to_string(),
            "light-SOL-1.5-0x1234".to_string(),
            format!("light--1.5-0x{}", sample_hex()),
            format!("light-SOL-abc-0x{}", sample_hex()),
            format!("dark-SOL-1.5-0x{}", sample_hex()),
            format!("light-SOL-1.5-0x{}", "zz".repeat(64)),
        ] {
            assert!(
                matches!(DepositNote::parse(&bad), Err(PoolError::InvalidNoteFormat)),
                "accepted {bad}"
            );
        }
    }

    #[test]
    fn test_display_round_trip() {
        let mut rng = StdRng::seed_from_u64(1);
        let note = DepositNote::generate("SOL", "0.1", &mut rng).unwrap();
        let parsed = DepositNote::parse(&note.to_string()).unwrap();
        assert_eq!(parsed, note);
        assert!(DepositNote::generate("S-OL", "1", &mut rng).is_err());
    }

    #[test]
    fn test_commitment_consistency() {
        let note = DepositNote::parse(&format!("light-SOL-1.5-0x{}", sample_hex())).unwrap();
        let again = DepositNote {
            currency: "other".into(),
            amount: "9".into(),
            nullifier: note.nullifier,
            secret: note.secret,
        };
        assert_eq!(note.commitment().unwrap(), again.commitment().unwrap());
        assert_eq!(note.nullifier_hash().unwrap(), again.nullifier_hash().unwrap());
        assert_ne!(note.commitment().unwrap(), note.nullifier_hash().unwrap());
    }
}
