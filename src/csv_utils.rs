//! CSV serialization utilities.

use serde::Serialize;
use std::io::Write;

/// Writes an iterator of records to a CSV writer.
/// Each record must implement Serialize. The header row is derived from the
/// first record, so an empty iterator writes nothing.
pub fn write_csv<T, W>(writer: W, records: impl Iterator<Item = T>) -> csv::Result<()>
where
    T: Serialize,
    W: Write,
{
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        id: u64,
        label: &'static str,
    }

    #[test]
    fn test_write_csv_with_header() -> csv::Result<()> {
        let mut output = Vec::new();
        let rows = vec![Row { id: 1, label: "a" }, Row { id: 2, label: "b,c" }];
        write_csv(&mut output, rows.into_iter())?;

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "id,label\n1,a\n2,\"b,c\"\n"
        );
        Ok(())
    }
}
