use std::io::Read;

use log::{debug, info};

use crate::request::variables::{InputError, VariableSet};

/// Read every variable set from `input`, one per line
///
/// Trailing whitespace of the whole stream is dropped, so empty input gives no sets at all. Any
/// malformed line fails the whole read: a partial batch is never returned.
pub fn read_variables<R: Read>(mut input: R) -> Result<Vec<VariableSet>, InputError> {
    let mut raw = Vec::new();
    input
        .read_to_end(&mut raw)
        .map_err(|err| InputError::Read(err.to_string()))?;
    let text = String::from_utf8(raw).map_err(|_| InputError::NotUtf8)?;

    let text = text.trim_end();
    if text.is_empty() {
        info!("No variables on standard input");
        return Ok(Vec::new());
    }

    let sets = text
        .lines()
        .enumerate()
        .map(|(i, line)| VariableSet::parse(i + 1, line))
        .collect::<Result<Vec<VariableSet>, InputError>>()?;

    info!("Read {} variable sets", sets.len());
    for set in &sets {
        debug!("Variables: {:?}", set.items());
    }
    Ok(sets)
}
