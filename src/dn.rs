//! Decomposition of RFC 2253 distinguished-name strings into
//! [`NameAttributes`].
//!
//! ```
//! use kzpki::dn;
//!
//! let dn = "CN=ИВАНОВ ИВАН,SURNAME=ИВАНОВ,SERIALNUMBER=IIN900101300123,C=KZ";
//! let attrs = dn::parse(dn).unwrap();
//! assert_eq!(attrs.iin.as_deref(), Some("900101300123"));
//! assert_eq!(attrs.country.as_deref(), Some("KZ"));
//! ```

use tracing::warn;

use crate::error::Error;
use crate::types::name::NameAttributes;

/// One `type=value` pair of a relative distinguished name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub kind: String,
    /// Unescaped value; `#hex` BER values are kept verbatim.
    pub value: String,
}

/// A relative distinguished name; more than one attribute when `+` joined.
pub type Rdn = Vec<Attribute>;

#[derive(Debug, Clone, Copy)]
enum Field {
    CommonName,
    Surname,
    GivenName,
    SerialNumber,
    Country,
    Locality,
    State,
    Email,
    Organization,
    OrganizationalUnit,
}

/// Recognized attribute types, matched case-insensitively.
const ATTRIBUTE_TYPES: &[(&str, Field)] = &[
    ("CN", Field::CommonName),
    ("SURNAME", Field::Surname),
    ("G", Field::GivenName),
    ("GIVENNAME", Field::GivenName),
    ("SERIALNUMBER", Field::SerialNumber),
    ("C", Field::Country),
    ("L", Field::Locality),
    ("S", Field::State),
    ("ST", Field::State),
    ("E", Field::Email),
    ("EMAILADDRESS", Field::Email),
    ("O", Field::Organization),
    ("OU", Field::OrganizationalUnit),
];

fn lookup_field(kind: &str) -> Option<Field> {
    ATTRIBUTE_TYPES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(kind))
        .map(|(_, field)| *field)
}

/// Iterate over the RDNs of `dn` from left to right.
pub fn rdns(dn: &str) -> RdnIter<'_> {
    RdnIter {
        input: dn.as_bytes(),
        pos: 0,
        expect_more: false,
        done: false,
    }
}

/// Parse `dn`, failing on the first malformed RDN.
pub fn parse(dn: &str) -> Result<NameAttributes, Error> {
    let mut attrs = NameAttributes {
        dn: dn.to_string(),
        ..Default::default()
    };
    for rdn in rdns(dn) {
        apply_rdn(&mut attrs, &rdn?);
    }
    Ok(attrs)
}

/// Parse `dn`, keeping the attributes decoded before any syntax error.
pub fn parse_lossy(dn: &str) -> NameAttributes {
    let mut attrs = NameAttributes {
        dn: dn.to_string(),
        ..Default::default()
    };
    for rdn in rdns(dn) {
        match rdn {
            Ok(rdn) => apply_rdn(&mut attrs, &rdn),
            Err(e) => {
                warn!(dn = %dn, error = %e, "Failed to parse distinguished name");
                break;
            }
        }
    }
    attrs
}

fn apply_rdn(attrs: &mut NameAttributes, rdn: &[Attribute]) {
    for attr in rdn {
        let Some(field) = lookup_field(&attr.kind) else {
            continue;
        };
        let value = attr.value.as_str();
        match field {
            Field::CommonName => first(&mut attrs.common_name, value),
            Field::Surname => first(&mut attrs.surname, value),
            Field::GivenName => first(&mut attrs.last_name, value),
            Field::Country => first(&mut attrs.country, value),
            Field::Locality => first(&mut attrs.locality, value),
            Field::State => first(&mut attrs.state, value),
            Field::Email => first(&mut attrs.email, value),
            Field::Organization => first(&mut attrs.organization, value),
            Field::OrganizationalUnit => {
                first(&mut attrs.bin, value.strip_prefix("BIN").unwrap_or(value))
            }
            Field::SerialNumber => {
                first(&mut attrs.serial_number, value);
                match value.strip_prefix("BIN") {
                    Some(bin) => first(&mut attrs.bin, bin),
                    None => first(&mut attrs.iin, value.strip_prefix("IIN").unwrap_or(value)),
                }
            }
        }
    }
}

// Leftmost occurrence wins.
fn first(slot: &mut Option<String>, value: &str) {
    if slot.is_none() {
        *slot = Some(value.to_string());
    }
}

/// Iterator returned by [`rdns`]. Stops after the first error.
pub struct RdnIter<'a> {
    input: &'a [u8],
    pos: usize,
    expect_more: bool,
    done: bool,
}

impl Iterator for RdnIter<'_> {
    type Item = Result<Rdn, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.skip_spaces();
        if self.at_end() {
            self.done = true;
            if self.expect_more {
                return Some(Err(self.error("expected attribute after separator")));
            }
            return None;
        }
        let rdn = self.parse_rdn();
        if rdn.is_err() {
            self.done = true;
        }
        Some(rdn)
    }
}

impl RdnIter<'_> {
    fn parse_rdn(&mut self) -> Result<Rdn, Error> {
        let mut rdn = Vec::new();
        loop {
            let kind = self.parse_type()?;
            self.skip_spaces();
            let value = self.parse_value()?;
            rdn.push(Attribute { kind, value });

            self.skip_spaces();
            match self.peek() {
                None => {
                    self.done = true;
                    return Ok(rdn);
                }
                Some(b'+') => {
                    self.pos += 1;
                    self.skip_spaces();
                }
                Some(b',') | Some(b';') => {
                    self.pos += 1;
                    self.expect_more = true;
                    return Ok(rdn);
                }
                Some(c) => {
                    return Err(self.error(&format!("unexpected character '{}'", c as char)))
                }
            }
        }
    }

    fn parse_type(&mut self) -> Result<String, Error> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'-' || c == b'.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if start == self.pos {
            return Err(self.error("missing attribute type"));
        }
        let kind = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
        self.skip_spaces();
        if self.peek() != Some(b'=') {
            return Err(self.error(&format!("expected '=' after attribute type {}", kind)));
        }
        self.pos += 1;
        // "OID.2.5.4.3" is an accepted spelling of "2.5.4.3"
        Ok(match kind.get(..4) {
            Some(prefix) if prefix.eq_ignore_ascii_case("OID.") => kind[4..].to_string(),
            _ => kind,
        })
    }

    fn parse_value(&mut self) -> Result<String, Error> {
        match self.peek() {
            Some(b'#') => self.parse_hex_value(),
            Some(b'"') => self.parse_quoted_value(),
            _ => self.parse_plain_value(),
        }
    }

    fn parse_hex_value(&mut self) -> Result<String, Error> {
        let start = self.pos;
        self.pos += 1;
        while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
            self.pos += 1;
        }
        let digits = self.pos - start - 1;
        if digits == 0 || digits % 2 != 0 {
            return Err(self.error("malformed #hex value"));
        }
        Ok(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned())
    }

    fn parse_quoted_value(&mut self) -> Result<String, Error> {
        self.pos += 1;
        let mut buf = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated quoted value")),
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    buf.push(self.parse_escape()?);
                }
                Some(c) => {
                    buf.push(c);
                    self.pos += 1;
                }
            }
        }
        self.utf8_value(buf)
    }

    fn parse_plain_value(&mut self) -> Result<String, Error> {
        let mut buf = Vec::new();
        // Length of `buf` up to the last byte that is not an unescaped space.
        let mut keep = 0;
        while let Some(c) = self.peek() {
            match c {
                b',' | b';' | b'+' => break,
                b'\\' => {
                    self.pos += 1;
                    buf.push(self.parse_escape()?);
                    keep = buf.len();
                }
                b' ' => {
                    buf.push(c);
                    self.pos += 1;
                }
                _ => {
                    buf.push(c);
                    self.pos += 1;
                    keep = buf.len();
                }
            }
        }
        buf.truncate(keep);
        self.utf8_value(buf)
    }

    fn parse_escape(&mut self) -> Result<u8, Error> {
        let c = self
            .peek()
            .ok_or_else(|| self.error("dangling escape at end of name"))?;
        match c {
            b',' | b'+' | b'"' | b'\\' | b'<' | b'>' | b';' | b'=' | b'#' | b' ' => {
                self.pos += 1;
                Ok(c)
            }
            _ => {
                let pair = self
                    .input
                    .get(self.pos..self.pos + 2)
                    .ok_or_else(|| self.error("truncated hex escape"))?;
                let byte = std::str::from_utf8(pair)
                    .ok()
                    .and_then(|s| u8::from_str_radix(s, 16).ok())
                    .ok_or_else(|| self.error("invalid escape sequence"))?;
                self.pos += 2;
                Ok(byte)
            }
        }
    }

    fn utf8_value(&self, buf: Vec<u8>) -> Result<String, Error> {
        String::from_utf8(buf).map_err(|_| self.error("value is not valid UTF-8"))
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn error(&self, message: &str) -> Error {
        Error::NameFormat(format!("{} at offset {}", message, self.pos))
    }
}
