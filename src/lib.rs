#![forbid(unsafe_code)]

//! as8 is the address resolution and linkage engine of a two-pass assembler for a 36-bit segmented mainframe.
//! It takes assembly source and produces a listing: loader directives (segment size and name, definitions,
//! entry points, external references) followed by every 36-bit word of the segment with its address.
//!
//! Along the way it keeps the symbol table, collects literals into a pool after the code,
//! gives every external reference a slot in the linkage section, lays out stack temporaries,
//! and checks that pass 2 computes every address the same way pass 1 did.
//!
//! # Example of Usage
//!
//! ```
//! # use as8::asm;
//! let src = r"
//!     lda five
//!     tra done
//! five: dec 5
//! done: nop
//! ";
//!
//! let listing = match asm::assemble("demo.alm", &mut src.as_bytes()) {
//!     Ok(listing) => listing,
//!     Err(e) => panic!("{}", e), // only failing to read the source is an Err
//! };
//! assert_eq!(listing.summary(), "0 error(s), 0 warning(s)");
//! assert_eq!(listing.lines(), &[
//!     "!SIZE 000004",
//!     "!NAME demo",
//!     "000000 xxxx 000002235000 lda five",
//!     "000001 xxxx 000003710000 tra done",
//!     "000002 xxxx 000000000005 five: dec 5",
//!     "000003 xxxx 000000011000 done: nop",
//! ]);
//! ```

#[macro_use] extern crate num_derive;
#[macro_use] extern crate lazy_static;

pub mod asm;
pub mod common;

#[cfg(test)]
mod test;
