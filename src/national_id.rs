//! Decoding of the 12-digit individual identification number (IIN).
//!
//! Layout: `YYMMDD` birth date, then one digit encoding century and gender,
//! then the registration number and a check digit.

use crate::types::name::{Gender, NameAttributes};

/// Birth data embedded in an IIN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NationalId {
    /// `YYYY-MM-DD`
    pub birth_date: String,
    pub gender: Gender,
}

/// Decode `iin`. `None` unless it is exactly 12 ASCII digits with a century
/// digit in `1..=6`.
pub fn decode(iin: &str) -> Option<NationalId> {
    if iin.len() != 12 || !iin.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (century, gender) = match iin.as_bytes()[6] {
        b'1' => ("18", Gender::Male),
        b'2' => ("18", Gender::Female),
        b'3' => ("19", Gender::Male),
        b'4' => ("19", Gender::Female),
        b'5' => ("20", Gender::Male),
        b'6' => ("20", Gender::Female),
        _ => return None,
    };
    Some(NationalId {
        birth_date: format!("{}{}-{}-{}", century, &iin[0..2], &iin[2..4], &iin[4..6]),
        gender,
    })
}

/// Fill `birth_date` and `gender` from the decoded `iin`, if any.
pub fn apply(attrs: &mut NameAttributes) {
    if let Some(id) = attrs.iin.as_deref().and_then(decode) {
        attrs.birth_date = Some(id.birth_date);
        attrs.gender = Some(id.gender);
    }
}
