use std::io::{Read, Write};

use anyhow::anyhow;
use csv::{ReaderBuilder, WriterBuilder};
use vitalwatch_types::{
    HealthRow, HealthSeries,
    table::{self, COLUMNS},
};

/// Reads and writes the flat health table as CSV.
pub struct CsvExporter;

impl CsvExporter {
    /// Writes the header followed by one line per row. The header is written
    /// even when `rows` is empty.
    pub fn write<W: Write>(writer: W, rows: &[HealthRow]) -> anyhow::Result<()> {
        let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
        wtr.write_record(COLUMNS)?;
        for row in rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        debug!("wrote {} rows", rows.len());
        Ok(())
    }

    pub fn export(rows: &[HealthRow]) -> anyhow::Result<String> {
        let mut data = Vec::new();
        Self::write(&mut data, rows)?;
        Ok(String::from_utf8(data)?)
    }

    pub fn read<R: Read>(reader: R) -> anyhow::Result<Vec<HealthRow>> {
        let mut rdr = ReaderBuilder::new().from_reader(reader);

        let headers = rdr.headers()?;
        if headers.iter().ne(COLUMNS) {
            return Err(anyhow!(
                "unexpected columns `{}`, expected `{}`",
                headers.iter().collect::<Vec<_>>().join(","),
                COLUMNS.join(",")
            ));
        }

        let rows = rdr.deserialize().collect::<Result<Vec<HealthRow>, _>>()?;
        debug!("read {} rows", rows.len());
        Ok(rows)
    }

    /// Raw series view of a table, dropping any analysis columns.
    pub fn read_series<R: Read>(reader: R) -> anyhow::Result<HealthSeries> {
        Ok(Self::read(reader)?.iter().map(HealthRow::to_record).collect())
    }

    pub fn write_series<W: Write>(writer: W, series: &HealthSeries) -> anyhow::Result<()> {
        Self::write(writer, &table::rows(series, &[], &[]))
    }
}
