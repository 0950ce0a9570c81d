//! Flag values and identifiers for put/get round trips.

use rand::Rng;
use uuid::Uuid;

/// Characters a flag body is drawn from.
const FLAG_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Random characters between the tag and the terminator.
const FLAG_BODY_LEN: usize = 30;

const FLAG_TERMINATOR: char = '=';

/// One flag travelling through a put/get round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagRecord {
    /// Secret value stored by `put` and verified by `get`.
    pub value: String,

    /// Identifier handed to `put`, replaced by the one `put` returns.
    pub id: String,

    pub vulnerability_slot: u32,
}

impl FlagRecord {
    /// Fresh flag for `checker` with a random initial identifier.
    pub fn generate(checker: &str, vulnerability_slot: u32) -> Self {
        Self {
            value: generate_flag(checker),
            id: generate_flag_id(),
            vulnerability_slot,
        }
    }
}

/// `<tag><30 x [A-Z0-9]>=`, where the tag is the checker name's first
/// character upper-cased.
pub fn generate_flag(checker: &str) -> String {
    let mut flag = String::with_capacity(FLAG_BODY_LEN + 2);
    flag.extend(checker.chars().take(1).flat_map(char::to_uppercase));

    let mut rng = rand::thread_rng();
    flag.extend(
        (0..FLAG_BODY_LEN).map(|_| char::from(FLAG_ALPHABET[rng.gen_range(0..FLAG_ALPHABET.len())])),
    );

    flag.push(FLAG_TERMINATOR);
    flag
}

/// 32 lowercase hex characters.
pub fn generate_flag_id() -> String {
    Uuid::new_v4().simple().to_string()
}
