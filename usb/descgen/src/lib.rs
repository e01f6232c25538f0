//! USB 3.0 / USB 2.0 descriptor memory generator
//!
//! This crate compiles the descriptor set of a USB device core into the initialization images of
//! its two descriptor memories:
//!
//! - a byte-wide memory read by the USB2 (high speed) protocol engine, and
//! - a 32-bit wide memory read by the USB3 (SuperSpeed) protocol engine, whose configuration
//!   additionally carries SuperSpeed endpoint companion descriptors and which alone holds the
//!   Binary Object Store.
//!
//! Each memory is written as a raw binary and as a `$readmemh` hex file. A Verilog header with
//! the address of every descriptor (and a few lengths) lets the control endpoint logic find them.
//!
//! The two images are built in lockstep by [DescriptorCompiler]; see [topology::compile] for the
//! order descriptors are emitted in.
//!
//! This documentation will refer directly to the relevant standards, which are as follows:
//!
//! - USB2  - [Universal Serial Bus Specification](https://www.usb.org/document-library/usb-20-specification)
//! - USB32 - [Universal Serial Bus 3.2 Specification Revision 1.1](https://usb.org/document-library/usb-32-revision-11-june-2022)
//!
pub extern crate plain;

mod compiler;
mod error;
mod group;
mod offsets;
mod scratch;
mod stream;
pub mod topology;
pub mod usb;

pub use compiler::*;
pub use error::{Error, Result};
pub use group::{ConfigGroup, GroupLengths};
pub use offsets::{Bitwidths, Entry, OffsetTable, Target};
pub use scratch::{DescriptorWriter, SCRATCH_CAPACITY};
pub use stream::{Stream, Width};
