use std::io::{self, Write};

use crate::model::{ErrorRecord, GeoResult, LocationRecord};

const SEPARATOR_WIDTH: usize = 40;

/// Print one location block.
pub fn write_location<W: Write>(out: &mut W, record: &LocationRecord) -> io::Result<()> {
    let state = record.state.as_deref().unwrap_or("Unknown");

    writeln!(out, "Location: {}, {}", record.name, state)?;
    writeln!(out, "Latitude: {}", record.lat)?;
    writeln!(out, "Longitude: {}", record.lon)?;
    writeln!(out, "Country: {}", record.country)?;
    writeln!(out, "{}", "=".repeat(SEPARATOR_WIDTH))
}

pub fn write_error<W: Write>(out: &mut W, query: &str, record: &ErrorRecord) -> io::Result<()> {
    writeln!(
        out,
        "Error: Unable to fetch data for {query}. Upstream reported {}: {}",
        record.code, record.message
    )
}

/// Print every result of `query` in order.
pub fn write_results<W: Write>(out: &mut W, query: &str, results: &[GeoResult]) -> io::Result<()> {
    for result in results {
        match result {
            GeoResult::Location(record) => write_location(out, record)?,
            GeoResult::Error(record) => write_error(out, query, record)?,
        }
    }
    Ok(())
}
