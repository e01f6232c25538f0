//! Named constants exported to the hardware build as a Verilog header.

use std::fmt;
use std::io::Write;

use crate::error::{Error, Result};

/// Which descriptor memory a constant describes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Target {
    Usb2,
    Usb3,
}

impl Target {
    pub const ALL: [Target; 2] = [Target::Usb2, Target::Usb3];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Usb2 => "USB2",
            Self::Usb3 => "USB3",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address widths of the two descriptor memories.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Bitwidths {
    pub usb2: u8,
    pub usb3: u8,
}

impl Default for Bitwidths {
    fn default() -> Self {
        Self { usb2: 8, usb3: 7 }
    }
}

impl Bitwidths {
    pub fn bits(&self, target: Target) -> u8 {
        match target {
            Target::Usb2 => self.usb2,
            Target::Usb3 => self.usb3,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Entry {
    pub name: String,
    pub target: Target,
    pub value: u32,
}

/// Constants in the order they were recorded. Entries are never revised.
#[derive(Clone, Debug, Default)]
pub struct OffsetTable {
    entries: Vec<Entry>,
}

impl OffsetTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: &str, target: Target, value: u32) -> Result<()> {
        if self.get(name, target).is_some() {
            return Err(Error::DuplicateConstant {
                target,
                name: name.to_owned(),
            });
        }
        self.entries.push(Entry {
            name: name.to_owned(),
            target,
            value,
        });
        Ok(())
    }

    pub fn get(&self, name: &str, target: Target) -> Option<u32> {
        self.entries
            .iter()
            .find(|entry| entry.target == target && entry.name == name)
            .map(|entry| entry.value)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes one `parameter` declaration per entry.
    pub fn export<W: Write>(&self, w: &mut W, bitwidths: Bitwidths) -> Result<()> {
        for entry in &self.entries {
            writeln!(
                w,
                "parameter\t[{}:0]\tDESCR_{}_{}\t= 'd{};",
                bitwidths.bits(entry.target).saturating_sub(1),
                entry.target,
                entry.name,
                entry.value
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{Bitwidths, OffsetTable, Target};
    use crate::error::Error;

    #[test]
    fn duplicates_are_rejected_per_target() {
        let mut table = OffsetTable::new();
        table.record("DEVICE", Target::Usb2, 0).unwrap();
        table.record("DEVICE", Target::Usb3, 0).unwrap();

        match table.record("DEVICE", Target::Usb2, 18) {
            Err(Error::DuplicateConstant { target, name }) => {
                assert_eq!(target, Target::Usb2);
                assert_eq!(name, "DEVICE");
            }
            other => panic!("expected duplicate, got {:?}", other),
        }
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("DEVICE", Target::Usb2), Some(0));
    }

    #[test]
    fn export_keeps_emission_order() {
        let mut table = OffsetTable::new();
        table.record("CONFIG", Target::Usb2, 28).unwrap();
        table.record("CONFIG", Target::Usb3, 5).unwrap();
        table.record("BOS_LEN", Target::Usb3, 22).unwrap();

        let mut out = Vec::new();
        table.export(&mut out, Bitwidths::default()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "parameter\t[7:0]\tDESCR_USB2_CONFIG\t= 'd28;\n\
             parameter\t[6:0]\tDESCR_USB3_CONFIG\t= 'd5;\n\
             parameter\t[6:0]\tDESCR_USB3_BOS_LEN\t= 'd22;\n"
        );
    }
}
