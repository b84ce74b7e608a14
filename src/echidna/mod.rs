//! Everything that depends on the fuzzer's own file formats.

pub(crate) mod artifacts;
pub(crate) mod coverage;
pub(crate) mod process;
pub(crate) mod report;
mod tx;

pub(crate) use tx::{EchidnaTx, TxCall};

use crate::error::{Error, Result};

/// Byte strings are stored as JSON strings holding one char per byte.
pub(crate) fn parse_bytes(data: &str) -> Result<Vec<u8>> {
    data.chars()
        .map(|c| {
            u8::try_from(c).map_err(|_| {
                Error::unsupported(format!("character {c:?} in byte string is not a byte"))
            })
        })
        .collect()
}

pub(crate) fn encode_bytes(bytes: &[u8]) -> String {
    bytes.iter().copied().map(char::from).collect()
}
