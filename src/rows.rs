use std::io::{Read, Write};

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::query::scalar_text;

/// One record's worth of fields, in source order.
pub type Row = Map<String, Value>;

pub const DEFAULT_DELIMITER: u8 = b',';
pub const TAB_DELIMITER: u8 = b'\t';

/// Ordered field→value row source over delimited text. The header row
/// defines the field names; cells are whitespace-trimmed.
pub struct RowReader<R: Read> {
    reader: csv::Reader<R>,
    headers: csv::StringRecord,
}

impl<R: Read> RowReader<R> {
    pub fn new(source: R, delimiter: u8) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        let headers = reader
            .headers()
            .map_err(|e| Error::Validation(format!("failed to read header row: {e}")))?
            .clone();
        Ok(RowReader { reader, headers })
    }

    pub fn next_row(&mut self) -> Option<Result<Row>> {
        let mut record = csv::StringRecord::new();
        match self.reader.read_record(&mut record) {
            Ok(false) => None,
            Ok(true) => {
                let mut row = Row::new();
                for (header, cell) in self.headers.iter().zip(record.iter()) {
                    row.insert(header.to_string(), Value::String(cell.to_string()));
                }
                Some(Ok(row))
            }
            Err(e) => Some(Err(Error::Validation(format!("failed to parse row: {e}")))),
        }
    }
}

/// Write records to a delimited sink. The first record's keys become the
/// header row; subsequent records are rendered against those field names,
/// with missing fields left empty. An empty record sequence writes nothing.
pub fn write_rows<W, I>(sink: W, records: I, delimiter: u8) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = Row>,
{
    let mut records = records.into_iter();
    let Some(first) = records.next() else {
        return Ok(());
    };

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(sink);
    let fields: Vec<String> = first.keys().cloned().collect();
    writer
        .write_record(&fields)
        .map_err(|e| Error::Validation(format!("failed to write header row: {e}")))?;

    for record in std::iter::once(first).chain(records) {
        let cells: Vec<String> = fields
            .iter()
            .map(|field| record.get(field).map(scalar_text).unwrap_or_default())
            .collect();
        writer
            .write_record(&cells)
            .map_err(|e| Error::Validation(format!("failed to write row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| Error::Validation(format!("failed to flush rows: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn read_all(text: &str, delimiter: u8) -> Vec<Row> {
        let mut reader = RowReader::new(text.as_bytes(), delimiter).unwrap();
        let mut rows = Vec::new();
        while let Some(row) = reader.next_row() {
            rows.push(row.unwrap());
        }
        rows
    }

    #[test]
    fn header_defines_field_names_in_order() {
        let rows = read_all("sample_id,site\ns-1,bham\ns-2, leeds\n", DEFAULT_DELIMITER);
        assert_eq!(rows.len(), 2);
        let fields: Vec<&String> = rows[0].keys().collect();
        assert_eq!(fields, ["sample_id", "site"]);
        assert_eq!(rows[0]["sample_id"], json!("s-1"));
        // Whitespace after the delimiter is trimmed.
        assert_eq!(rows[1]["site"], json!("leeds"));
    }

    #[test]
    fn tab_delimiter() {
        let rows = read_all("sample_id\tsite\ns-1\tbham\n", TAB_DELIMITER);
        assert_eq!(rows[0]["site"], json!("bham"));
    }

    #[test]
    fn empty_source_yields_no_rows() {
        let mut reader = RowReader::new(&b""[..], DEFAULT_DELIMITER).unwrap();
        assert!(reader.next_row().is_none());
    }

    #[test]
    fn writes_header_from_first_record() {
        let mut first = Row::new();
        first.insert("sample_id".to_string(), json!("s-1"));
        first.insert("count".to_string(), json!(3));
        let mut second = Row::new();
        second.insert("sample_id".to_string(), json!("s-2"));
        second.insert("count".to_string(), json!(Value::Null));

        let mut out = Vec::new();
        write_rows(&mut out, vec![first, second], DEFAULT_DELIMITER).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "sample_id,count\ns-1,3\ns-2,\n"
        );
    }

    #[test]
    fn writes_nothing_for_empty_sequence() {
        let mut out = Vec::new();
        write_rows(&mut out, Vec::<Row>::new(), DEFAULT_DELIMITER).unwrap();
        assert!(out.is_empty());
    }
}
