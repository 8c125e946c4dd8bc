//! Capabilities the bridge requires from the host analysis engine.
//!
//! All of them are called from the RPC worker thread, so implementations must either be thread
//! safe or redirect calls to the thread owning the engine.

use crate::bridge::address::AbsoluteAddress;
use crate::error::Error;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Packed `0xRRGGBB` color.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const RED: Rgb = Rgb::from_packed(0xff0000);
    pub const GREEN: Rgb = Rgb::from_packed(0x00ff00);

    pub const fn from_packed(color: u32) -> Self {
        Rgb {
            red: ((color >> 16) & 0xff) as u8,
            green: ((color >> 8) & 0xff) as u8,
            blue: (color & 0xff) as u8,
        }
    }

    pub fn packed(self) -> u32 {
        (self.red as u32) << 16 | (self.green as u32) << 8 | self.blue as u32
    }
}

impl FromStr for Rgb {
    type Err = Error;

    /// Parse color literal (decimal or `0x` prefixed hex), value must fit into 24 bits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidColor(s.to_string());
        let packed = s.parse::<AbsoluteAddress>().map_err(|_| invalid())?.as_u64();
        if packed > 0xff_ffff {
            return Err(invalid());
        }
        Ok(Rgb::from_packed(packed as u32))
    }
}

impl Display for Rgb {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:06x}", self.packed())
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:#08x}", self.packed()))
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Highlight colors used by the bridge itself.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Palette {
    pub breakpoint: Rgb,
    pub current_instruction: Rgb,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            breakpoint: Rgb::RED,
            current_instruction: Rgb::GREEN,
        }
    }
}

/// Handle of a routine (function) known by the analysis engine.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Routine {
    pub start: AbsoluteAddress,
    pub name: Option<String>,
}

impl Display for Routine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}@{}", self.start),
            None => write!(f, "sub_{:x}", self.start.as_u64()),
        }
    }
}

/// Visual annotations of the analysis engine.
pub trait AnnotationSink: Send + Sync {
    /// Set (`Some`) or clear (`None`) instruction highlight.
    /// Return false if the address is not inside any routine.
    fn highlight(&self, addr: AbsoluteAddress, color: Option<Rgb>) -> bool;

    /// Tag an address as a breakpoint.
    fn attach_marker(&self, addr: AbsoluteAddress);

    /// Remove breakpoint tag from an address.
    fn detach_marker(&self, addr: AbsoluteAddress);

    fn find_containing_routine(&self, addr: AbsoluteAddress) -> Option<Routine>;

    /// Attach a comment to an instruction of a routine.
    fn set_comment(&self, routine: &Routine, addr: AbsoluteAddress, text: &str) -> bool;
}

/// Focus control of the engine user interface.
pub trait Navigator: Send + Sync {
    fn move_focus(&self, addr: AbsoluteAddress) -> bool;
}

/// Static information about the analysis session.
pub trait SessionInfo: Send + Sync {
    fn entry_point(&self) -> AbsoluteAddress;

    fn page_size(&self) -> u64;

    fn tool_name(&self) -> String;

    fn tool_version(&self) -> String;
}

#[cfg(test)]
pub(crate) mod recorder {
    use super::*;
    use std::sync::Mutex;

    #[derive(Clone, PartialEq, Eq, Debug)]
    pub enum Call {
        Highlight(u64, Option<Rgb>),
        Attach(u64),
        Detach(u64),
        Comment(u64, String),
        Focus(u64),
    }

    /// Engine double that records every call. Routines cover `[0x1000, 0x2000)`
    /// and `[0x400000, 0x500000)`.
    #[derive(Default)]
    pub struct Recorder {
        pub calls: Mutex<Vec<Call>>,
    }

    impl Recorder {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn clear(&self) {
            self.calls.lock().unwrap().clear();
        }

        fn push(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl AnnotationSink for Recorder {
        fn highlight(&self, addr: AbsoluteAddress, color: Option<Rgb>) -> bool {
            self.push(Call::Highlight(addr.as_u64(), color));
            self.find_containing_routine(addr).is_some()
        }

        fn attach_marker(&self, addr: AbsoluteAddress) {
            self.push(Call::Attach(addr.as_u64()));
        }

        fn detach_marker(&self, addr: AbsoluteAddress) {
            self.push(Call::Detach(addr.as_u64()));
        }

        fn find_containing_routine(&self, addr: AbsoluteAddress) -> Option<Routine> {
            [(0x1000, 0x2000), (0x400000, 0x500000)]
                .into_iter()
                .find(|(start, end)| (*start..*end).contains(&addr.as_u64()))
                .map(|(start, _)| Routine {
                    start: AbsoluteAddress::from(start),
                    name: None,
                })
        }

        fn set_comment(&self, _: &Routine, addr: AbsoluteAddress, text: &str) -> bool {
            self.push(Call::Comment(addr.as_u64(), text.to_string()));
            true
        }
    }

    impl Navigator for Recorder {
        fn move_focus(&self, addr: AbsoluteAddress) -> bool {
            self.push(Call::Focus(addr.as_u64()));
            true
        }
    }

    impl SessionInfo for Recorder {
        fn entry_point(&self) -> AbsoluteAddress {
            AbsoluteAddress::from(0x401a2c)
        }

        fn page_size(&self) -> u64 {
            0x1000
        }

        fn tool_name(&self) -> String {
            "recorder".to_string()
        }

        fn tool_version(&self) -> String {
            "1.0".to_string()
        }
    }
}

#[cfg(test)]
mod test {
    use super::Rgb;
    use crate::error::Error;

    #[test]
    fn test_rgb_parse() {
        let c: Rgb = "0xff8001".parse().unwrap();
        assert_eq!(
            c,
            Rgb {
                red: 0xff,
                green: 0x80,
                blue: 0x01
            }
        );
        assert_eq!(c.packed(), 0xff8001);
        assert_eq!(c.to_string(), "#ff8001");
        assert!(matches!(
            "0x1000000".parse::<Rgb>(),
            Err(Error::InvalidColor(ref c)) if c == "0x1000000"
        ));
        assert!(matches!("red".parse::<Rgb>(), Err(Error::InvalidColor(_))));
    }
}
