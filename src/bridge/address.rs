use crate::error::Error;
use once_cell::sync;
use regex::Regex;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Represent address in the disassembler view.
/// Absolute address is an [`Offset`] + session [`Base`].
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct AbsoluteAddress(u64);

impl AbsoluteAddress {
    /// Translate address into an offset relative to `base`.
    /// Fails with [`Error::InvalidAddress`] if address lies below the base.
    pub fn into_offset(self, base: Base) -> Result<Offset, Error> {
        self.0
            .checked_sub(base.address().as_u64())
            .map(Offset)
            .ok_or_else(|| Error::InvalidAddress {
                address: self.to_string(),
                base,
            })
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for AbsoluteAddress {
    fn from(addr: u64) -> Self {
        AbsoluteAddress(addr)
    }
}

impl From<AbsoluteAddress> for u64 {
    fn from(addr: AbsoluteAddress) -> Self {
        addr.0
    }
}

impl Display for AbsoluteAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl FromStr for AbsoluteAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_literal(s).map(AbsoluteAddress)
    }
}

/// Represent address relative to the load base of analyzed binary.
/// This is how the debugger side addresses code.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct Offset(u64);

impl Offset {
    /// Translate offset into an absolute address. Fails on address space overflow.
    pub fn relocate(self, base: Base) -> Result<AbsoluteAddress, Error> {
        base.address()
            .as_u64()
            .checked_add(self.0)
            .map(AbsoluteAddress)
            .ok_or_else(|| Error::InvalidAddress {
                address: format!("{base}+{self}"),
                base,
            })
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for Offset {
    fn from(off: u64) -> Self {
        Offset(off)
    }
}

impl From<Offset> for u64 {
    fn from(off: Offset) -> Self {
        off.0
    }
}

impl Display for Offset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl FromStr for Offset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_literal(s).map(Offset)
    }
}

/// Load base of the analyzed binary, fixed for a whole session.
#[derive(Clone, Copy, Hash, PartialEq, Eq, Debug, Default)]
pub struct Base(AbsoluteAddress);

impl Base {
    pub fn new(addr: AbsoluteAddress) -> Self {
        Base(addr)
    }

    /// Base is an entry point rounded down to the page boundary.
    pub fn from_entry_point(entry: AbsoluteAddress, page_size: u64) -> Result<Self, Error> {
        if !page_size.is_power_of_two() {
            return Err(Error::InvalidPageSize(page_size));
        }
        Ok(Base(AbsoluteAddress(entry.0 & !(page_size - 1))))
    }

    pub fn address(self) -> AbsoluteAddress {
        self.0
    }
}

impl Display for Base {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Translate offset into absolute address using a session base.
pub fn to_absolute(offset: Offset, base: Base) -> Result<AbsoluteAddress, Error> {
    offset.relocate(base)
}

/// Translate absolute address into offset using a session base.
pub fn to_offset(address: AbsoluteAddress, base: Base) -> Result<Offset, Error> {
    address.into_offset(base)
}

/// Parse address literal, decimal or `0x` prefixed hexadecimal.
pub fn parse_address(literal: &str) -> Result<AbsoluteAddress, Error> {
    literal.parse()
}

fn parse_literal(literal: &str) -> Result<u64, Error> {
    static LITERAL_RE: sync::Lazy<Regex> = sync::Lazy::new(|| {
        Regex::new(r"^(?:0[xX]([0-9a-fA-F]+)|([0-9]+))$").expect("must compile")
    });

    let malformed = || Error::MalformedAddress(literal.to_string());
    let caps = LITERAL_RE.captures(literal.trim()).ok_or_else(malformed)?;
    let parsed = match (caps.get(1), caps.get(2)) {
        (Some(hex), _) => u64::from_str_radix(hex.as_str(), 16),
        (None, Some(dec)) => dec.as_str().parse::<u64>(),
        (None, None) => return Err(malformed()),
    };
    parsed.map_err(|_| malformed())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_address() {
        struct TestCase {
            input: &'static str,
            expected: Option<u64>,
        }

        let cases = [
            TestCase {
                input: "0x4049de",
                expected: Some(0x4049de),
            },
            TestCase {
                input: "0X10",
                expected: Some(0x10),
            },
            TestCase {
                input: "4198400",
                expected: Some(4198400),
            },
            TestCase {
                input: " 0x20\n",
                expected: Some(0x20),
            },
            TestCase {
                input: "0",
                expected: Some(0),
            },
            TestCase {
                input: "0xffffffffffffffff",
                expected: Some(u64::MAX),
            },
            TestCase {
                input: "0x1ffffffffffffffff",
                expected: None,
            },
            TestCase {
                input: "not-an-address",
                expected: None,
            },
            TestCase {
                input: "",
                expected: None,
            },
            TestCase {
                input: "0x",
                expected: None,
            },
            TestCase {
                input: "-16",
                expected: None,
            },
            TestCase {
                input: "0o17",
                expected: None,
            },
            TestCase {
                input: "12ab",
                expected: None,
            },
        ];

        for tc in cases {
            let result = parse_address(tc.input);
            match tc.expected {
                Some(v) => assert_eq!(result.unwrap(), AbsoluteAddress::from(v), "{}", tc.input),
                None => assert!(
                    matches!(result, Err(Error::MalformedAddress(_))),
                    "{}",
                    tc.input
                ),
            }
        }
    }

    #[test]
    fn test_base_from_entry_point() {
        let base = Base::from_entry_point(AbsoluteAddress::from(0x401a2c), 0x1000).unwrap();
        assert_eq!(base.address(), AbsoluteAddress::from(0x401000));

        let base = Base::from_entry_point(AbsoluteAddress::from(0x401000), 0x1000).unwrap();
        assert_eq!(base.address(), AbsoluteAddress::from(0x401000));

        assert!(matches!(
            Base::from_entry_point(AbsoluteAddress::from(0x401a2c), 0x1001),
            Err(Error::InvalidPageSize(0x1001))
        ));
    }

    #[test]
    fn test_offset_round_trip() {
        let base = Base::new(AbsoluteAddress::from(0x555555554000));
        for off in [0, 1, 0x10, 0x1234, 0xfff_ffff] {
            let off = Offset::from(off);
            let addr = to_absolute(off, base).unwrap();
            assert_eq!(to_offset(addr, base).unwrap(), off);
        }
    }

    #[test]
    fn test_translation_errors() {
        let base = Base::new(AbsoluteAddress::from(0x400000));
        assert!(matches!(
            to_offset(AbsoluteAddress::from(0x3fffff), base),
            Err(Error::InvalidAddress { .. })
        ));
        assert!(matches!(
            to_absolute(Offset::from(u64::MAX), base),
            Err(Error::InvalidAddress { .. })
        ));
    }
}
