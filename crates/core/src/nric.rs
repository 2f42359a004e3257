//! Singapore NRIC/FIN checksum validation and generation.
//!
//! An identifier is 9 characters: a prefix letter (`S`, `T`, `F`, `G` or `M`), seven digits and
//! a checksum letter. The checksum is derived from a weighted digit sum plus a prefix-dependent
//! offset, taken modulo 11 and looked up in the alphabet of the prefix's group.
//!
//! Example: `S1234567`
//!
//! ```text
//! 1*2 + 2*7 + 3*6 + 4*5 + 5*4 + 6*3 + 7*2 = 106
//! (106 + 0) mod 11 = 7  ->  S/T alphabet[7] = 'D'  ->  S1234567D
//! ```

use rand::Rng;
use std::fmt;
use std::str::FromStr;

/// Weights applied to the seven digit positions, in order.
pub const WEIGHTS: [u32; 7] = [2, 7, 6, 5, 4, 3, 2];

const ST_ALPHABET: [char; 11] = ['J', 'Z', 'I', 'H', 'G', 'F', 'E', 'D', 'C', 'B', 'A'];
const FG_ALPHABET: [char; 11] = ['X', 'W', 'U', 'T', 'R', 'Q', 'P', 'N', 'M', 'L', 'K'];
const M_ALPHABET: [char; 11] = ['K', 'L', 'J', 'N', 'P', 'Q', 'R', 'T', 'U', 'W', 'X'];

/// Errors raised while parsing or generating an identifier.
///
/// All of these are caller input errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NricError {
    #[error("prefix must be one of S, T, F, G, M, got '{0}'")]
    InvalidPrefix(String),
    #[error("expected exactly 7 numeric digits, got '{0}'")]
    InvalidDigits(String),
    #[error("'{0}' is not a prefix letter, 7 digits and a checksum letter")]
    InvalidFormat(String),
    #[error("checksum letter '{found}' does not match expected '{expected}'")]
    ChecksumMismatch { expected: char, found: char },
}

/// Identifier prefix letter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NricPrefix {
    S,
    T,
    F,
    G,
    M,
}

impl NricPrefix {
    pub const ALL: [NricPrefix; 5] = [
        NricPrefix::S,
        NricPrefix::T,
        NricPrefix::F,
        NricPrefix::G,
        NricPrefix::M,
    ];

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'S' => Some(NricPrefix::S),
            'T' => Some(NricPrefix::T),
            'F' => Some(NricPrefix::F),
            'G' => Some(NricPrefix::G),
            'M' => Some(NricPrefix::M),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            NricPrefix::S => 'S',
            NricPrefix::T => 'T',
            NricPrefix::F => 'F',
            NricPrefix::G => 'G',
            NricPrefix::M => 'M',
        }
    }

    /// Added to the weighted sum before the modulo.
    fn offset(self) -> u32 {
        match self {
            NricPrefix::S | NricPrefix::F => 0,
            NricPrefix::T | NricPrefix::G => 4,
            NricPrefix::M => 3,
        }
    }

    fn alphabet(self) -> &'static [char; 11] {
        match self {
            NricPrefix::S | NricPrefix::T => &ST_ALPHABET,
            NricPrefix::F | NricPrefix::G => &FG_ALPHABET,
            NricPrefix::M => &M_ALPHABET,
        }
    }
}

impl fmt::Display for NricPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for NricPrefix {
    type Err = NricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        let mut chars = upper.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                NricPrefix::from_char(c).ok_or_else(|| NricError::InvalidPrefix(s.to_string()))
            }
            _ => Err(NricError::InvalidPrefix(s.to_string())),
        }
    }
}

/// Checksum letter for `prefix` followed by `digits` (each 0..=9).
fn checksum_letter(prefix: NricPrefix, digits: &[u32; 7]) -> char {
    let weighted: u32 = digits.iter().zip(WEIGHTS).map(|(d, w)| d * w).sum();
    let remainder = (weighted + prefix.offset()) % 11;
    prefix.alphabet()[remainder as usize]
}

fn parse_digits(digits: &str) -> Option<[u32; 7]> {
    let bytes = digits.as_bytes();
    if bytes.len() != 7 || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }

    let mut out = [0u32; 7];
    for (slot, b) in out.iter_mut().zip(bytes) {
        *slot = u32::from(b - b'0');
    }
    Some(out)
}

/// Namespace for the checksum operations.
pub struct NricChecksum;

impl NricChecksum {
    /// Returns true iff `input` (trimmed, case-insensitive) is a well-formed identifier whose
    /// last letter is the correct checksum.
    pub fn validate(input: &str) -> bool {
        Nric::parse(input).is_ok()
    }

    /// Builds `prefix + digits + checksum`.
    ///
    /// # Errors
    ///
    /// Returns [`NricError::InvalidDigits`] unless `digits` is exactly seven ASCII digits.
    pub fn generate(prefix: NricPrefix, digits: &str) -> Result<String, NricError> {
        let parsed =
            parse_digits(digits).ok_or_else(|| NricError::InvalidDigits(digits.to_string()))?;
        let letter = checksum_letter(prefix, &parsed);
        Ok(format!("{}{}{}", prefix.as_char(), digits, letter))
    }

    /// Generates a valid identifier with random digits, for test and demo data.
    pub fn random<R: Rng + ?Sized>(prefix: NricPrefix, rng: &mut R) -> Nric {
        let mut digits = [0u32; 7];
        for d in digits.iter_mut() {
            *d = rng.gen_range(0..10);
        }
        let body: String = digits
            .iter()
            .filter_map(|d| char::from_digit(*d, 10))
            .collect();
        let letter = checksum_letter(prefix, &digits);
        Nric(format!("{}{}{}", prefix.as_char(), body, letter))
    }
}

/// A checksum-validated, uppercase NRIC/FIN.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Nric(String);

impl Nric {
    /// Trims, uppercases and validates `input`.
    ///
    /// # Errors
    ///
    /// - [`NricError::InvalidFormat`] if the normalised input is not a prefix letter, seven
    ///   digits and a letter `A`-`Z`.
    /// - [`NricError::ChecksumMismatch`] if the final letter is not the expected checksum.
    pub fn parse(input: &str) -> Result<Self, NricError> {
        let normalised = input.trim().to_uppercase();
        let bytes = normalised.as_bytes();
        let format_err = || NricError::InvalidFormat(input.to_string());

        if bytes.len() != 9 || !normalised.is_ascii() {
            return Err(format_err());
        }

        let prefix = NricPrefix::from_char(char::from(bytes[0])).ok_or_else(format_err)?;
        let digits = parse_digits(&normalised[1..8]).ok_or_else(format_err)?;
        let found = char::from(bytes[8]);
        if !found.is_ascii_uppercase() {
            return Err(format_err());
        }

        let expected = checksum_letter(prefix, &digits);
        if found != expected {
            return Err(NricError::ChecksumMismatch { expected, found });
        }

        Ok(Self(normalised))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn prefix(&self) -> NricPrefix {
        // Parsed values always start with a valid prefix letter.
        self.0
            .chars()
            .next()
            .and_then(NricPrefix::from_char)
            .unwrap_or(NricPrefix::S)
    }

    /// Masked form for logs and listings, e.g. `S****567D`.
    pub fn masked(&self) -> String {
        format!("{}****{}", &self.0[0..1], &self.0[5..9])
    }
}

impl fmt::Display for Nric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Nric {
    type Err = NricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Nric::parse(s)
    }
}

impl serde::Serialize for Nric {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Nric {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Nric::parse(&s).map_err(serde::de::Error::custom)
    }
}
