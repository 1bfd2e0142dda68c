//! Classification and validation of the identifiers used across the admin forms.
//!
//! All functions are pure. Validation runs before a request is built, so a malformed
//! CPF or CNPJ never reaches the backend.

use std::fmt;

const CNPJ_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// The identifier shapes the admin knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    /// Brazilian individual taxpayer id, 11 digits, `000.000.000-00`.
    Cpf,
    /// Brazilian company registration, 14 digits, `00.000.000/0000-00`.
    Cnpj,
    /// A hyphenated uuid, as used for backend entity ids.
    Uuid,
    /// A plain numeric id.
    Numeric,
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdKind::Cpf => write!(f, "CPF"),
            IdKind::Cnpj => write!(f, "CNPJ"),
            IdKind::Uuid => write!(f, "UUID"),
            IdKind::Numeric => write!(f, "numeric id"),
        }
    }
}

/// Why an identifier was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// Wrong number of digits.
    #[error("{kind} must have {expected} digits, found {found}")]
    InvalidLength {
        /// The expected shape.
        kind: IdKind,
        /// The required digit count.
        expected: usize,
        /// The digit count found.
        found: usize,
    },
    /// A character that is neither a digit nor a mask separator.
    #[error("invalid character {0:?}")]
    InvalidCharacter(char),
    /// All digits equal, e.g. `111.111.111-11`, which passes the check digits but is never issued.
    #[error("{0} can't be a repeated digit sequence")]
    RepeatedDigits(IdKind),
    /// The check digits don't match.
    #[error("{0} check digits don't match")]
    CheckDigits(IdKind),
}

/// Keep only the ascii digits.
pub fn strip_formatting(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Classify `raw` into one of the known shapes, `None` when it matches none of them.
///
/// Input with mask separators (`.`, `-`, `/`) must be a valid CPF or CNPJ.
/// Plain digits are a CPF or CNPJ when their check digits hold, otherwise numeric.
pub fn classify(raw: &str) -> Option<IdKind> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if is_uuid(raw) {
        return Some(IdKind::Uuid);
    }
    let plain_digits = raw.chars().all(|c| c.is_ascii_digit());
    if validate_cpf(raw).is_ok() {
        Some(IdKind::Cpf)
    } else if validate_cnpj(raw).is_ok() {
        Some(IdKind::Cnpj)
    } else if plain_digits {
        Some(IdKind::Numeric)
    } else {
        None
    }
}

/// Validate a CPF, with or without its mask, returning the 11 digits.
pub fn validate_cpf(raw: &str) -> Result<String, IdError> {
    let digits = digits_of(raw, IdKind::Cpf, 11)?;
    let first = cpf_check_digit(&digits[..9]);
    let second = cpf_check_digit(&digits[..10]);
    if digits[9] != first || digits[10] != second {
        return Err(IdError::CheckDigits(IdKind::Cpf));
    }
    Ok(to_string(&digits))
}

/// Validate a CNPJ, with or without its mask, returning the 14 digits.
pub fn validate_cnpj(raw: &str) -> Result<String, IdError> {
    let digits = digits_of(raw, IdKind::Cnpj, 14)?;
    let first = cnpj_check_digit(&digits[..12]);
    let second = cnpj_check_digit(&digits[..13]);
    if digits[12] != first || digits[13] != second {
        return Err(IdError::CheckDigits(IdKind::Cnpj));
    }
    Ok(to_string(&digits))
}

/// Validate and apply the `000.000.000-00` mask.
pub fn format_cpf(raw: &str) -> Result<String, IdError> {
    let d = validate_cpf(raw)?;
    Ok(format!("{}.{}.{}-{}", &d[..3], &d[3..6], &d[6..9], &d[9..]))
}

/// Validate and apply the `00.000.000/0000-00` mask.
pub fn format_cnpj(raw: &str) -> Result<String, IdError> {
    let d = validate_cnpj(raw)?;
    Ok(format!(
        "{}.{}.{}/{}-{}",
        &d[..2],
        &d[2..5],
        &d[5..8],
        &d[8..12],
        &d[12..]
    ))
}

fn digits_of(raw: &str, kind: IdKind, expected: usize) -> Result<Vec<u32>, IdError> {
    let mut digits = Vec::with_capacity(expected);
    for c in raw.trim().chars() {
        match c {
            '0'..='9' => digits.push(c as u32 - '0' as u32),
            '.' | '-' | '/' | ' ' => {}
            other => return Err(IdError::InvalidCharacter(other)),
        }
    }
    if digits.len() != expected {
        return Err(IdError::InvalidLength {
            kind,
            expected,
            found: digits.len(),
        });
    }
    if digits.iter().all(|d| *d == digits[0]) {
        return Err(IdError::RepeatedDigits(kind));
    }
    Ok(digits)
}

// Weights run from len+1 down to 2.
fn cpf_check_digit(digits: &[u32]) -> u32 {
    let weight_start = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(idx, d)| d * (weight_start - idx as u32))
        .sum();
    match (sum * 10) % 11 {
        10 => 0,
        rest => rest,
    }
}

fn cnpj_check_digit(digits: &[u32]) -> u32 {
    // The first digit uses the weights without their leading 6.
    let weights = &CNPJ_WEIGHTS[CNPJ_WEIGHTS.len() - digits.len()..];
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    match sum % 11 {
        0 | 1 => 0,
        rest => 11 - rest,
    }
}

fn to_string(digits: &[u32]) -> String {
    digits
        .iter()
        .filter_map(|d| char::from_digit(*d, 10))
        .collect()
}

fn is_uuid(raw: &str) -> bool {
    const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];
    let parts = raw.split('-').collect::<Vec<_>>();
    parts.len() == GROUPS.len()
        && parts
            .iter()
            .zip(GROUPS)
            .all(|(part, len)| part.len() == len && part.chars().all(|c| c.is_ascii_hexdigit()))
}
