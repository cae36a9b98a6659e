//! Line-oriented symbol table format.
//!
//! ```text
//! PK: <from> <to>
//! CL: <from> <to>
//! FD: <fromOwner>/<fromName> <toOwner>/<toName>
//! MD: <fromOwner>/<fromName> <fromDesc> <toOwner>/<toName> <toDesc>
//! ```
//!
//! The same grammar is used for MCP `joined.srg` inputs and for the generated
//! mapping files this crate writes.

use crate::error::{Error, Result};
use crate::mapping::entry::MappingEntry;
use crate::mapping::table::MappingTable;
use std::fmt::Write as _;

/// Renders one pair as a single record, without the trailing newline.
/// Pairs of different kinds have no record form.
pub fn format_record(from: &MappingEntry, to: &MappingEntry) -> Result<String> {
    let record = match (from, to) {
        (MappingEntry::Package { name: a }, MappingEntry::Package { name: b }) => {
            format!("PK: {} {}", a, b)
        }
        (MappingEntry::Class { name: a }, MappingEntry::Class { name: b }) => {
            format!("CL: {} {}", a, b)
        }
        (MappingEntry::Field { .. }, MappingEntry::Field { .. }) => {
            format!("FD: {} {}", from, to)
        }
        (
            MappingEntry::Method {
                owner: o1,
                name: n1,
                descriptor: d1,
            },
            MappingEntry::Method {
                owner: o2,
                name: n2,
                descriptor: d2,
            },
        ) => format!("MD: {}/{} {} {}/{} {}", o1, n1, d1, o2, n2, d2),
        _ => {
            return Err(Error::parse(
                "mapping table",
                None,
                format!("cannot write {} {} mapped to {} {}", from.kind(), from, to.kind(), to),
            ))
        }
    };
    Ok(record)
}

/// Serializes a table in emission order, one `\n`-terminated record per pair.
pub fn write(table: &MappingTable) -> Result<String> {
    let mut out = String::new();
    for (from, to) in table {
        // writing into a String cannot fail
        let _ = writeln!(out, "{}", format_record(from, to)?);
    }
    Ok(out)
}

/// Parses one line. Blank lines and `#` comments yield `None`.
pub fn parse_record(
    line: &str,
    line_no: usize,
    source_name: &str,
) -> Result<Option<(MappingEntry, MappingEntry)>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    let err = |message: String| Error::parse(source_name, Some(line_no), message);
    let expect_arity = |n: usize| {
        if tokens.len() == n + 1 {
            Ok(())
        } else {
            Err(err(format!(
                "{} record needs {} names, found {}",
                tokens[0],
                n,
                tokens.len() - 1
            )))
        }
    };

    let pair = match tokens[0] {
        "PK:" => {
            expect_arity(2)?;
            (
                MappingEntry::package(tokens[1]),
                MappingEntry::package(tokens[2]),
            )
        }
        "CL:" => {
            expect_arity(2)?;
            (MappingEntry::class(tokens[1]), MappingEntry::class(tokens[2]))
        }
        "FD:" => {
            expect_arity(2)?;
            let from = MappingEntry::qualified_field(tokens[1])
                .ok_or_else(|| err(format!("malformed field name '{}'", tokens[1])))?;
            let to = MappingEntry::qualified_field(tokens[2])
                .ok_or_else(|| err(format!("malformed field name '{}'", tokens[2])))?;
            (from, to)
        }
        "MD:" => {
            expect_arity(4)?;
            let from = MappingEntry::qualified_method(tokens[1], tokens[2])
                .ok_or_else(|| err(format!("malformed method name '{}'", tokens[1])))?;
            let to = MappingEntry::qualified_method(tokens[3], tokens[4])
                .ok_or_else(|| err(format!("malformed method name '{}'", tokens[3])))?;
            (from, to)
        }
        other => return Err(err(format!("unknown record type '{}'", other))),
    };
    Ok(Some(pair))
}

/// Parses every record of `text`, in order.
pub fn records(text: &str, source_name: &str) -> Result<Vec<(MappingEntry, MappingEntry)>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if let Some(pair) = parse_record(line, idx + 1, source_name)? {
            out.push(pair);
        }
    }
    Ok(out)
}

/// Parses a whole file into a table. A key bound twice to different values
/// is an error.
pub fn parse(text: &str, source_name: &str) -> Result<MappingTable> {
    let mut table = MappingTable::new();
    for (idx, line) in text.lines().enumerate() {
        if let Some((from, to)) = parse_record(line, idx + 1, source_name)? {
            table.insert(from, to).map_err(|e| match e {
                Error::MappingSourceParse { message, .. } => {
                    Error::parse(source_name, Some(idx + 1), message)
                }
                other => other,
            })?;
        }
    }
    Ok(table)
}
