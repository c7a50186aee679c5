use std::fs::File;

use anyhow::{Context as _, Result, anyhow, bail};
use csv::{Reader, StringRecord};
use nightwatcher::reading::{
    FieldKind, NewReading, READING_FIELD_KINDS, READING_FIELDS, validate,
};
use serde_json::{Map, Number, Value};

/// Column index of each reading field, in `READING_FIELDS` order.
#[derive(Debug, Clone, Copy)]
struct Columns([usize; READING_FIELDS.len()]);

impl Columns {
    fn from_header(header: &StringRecord) -> Result<Self> {
        let mut indices = [0; READING_FIELDS.len()];
        for (slot, field) in indices.iter_mut().zip(READING_FIELDS) {
            *slot = header
                .iter()
                .position(|h| h.trim() == field)
                .ok_or_else(|| anyhow!("CSV header is missing column: {field}"))?;
        }
        Ok(Self(indices))
    }

    fn get<'r>(&self, row: &'r StringRecord, field: usize) -> Result<&'r str> {
        row.get(self.0[field])
            .map(str::trim)
            .ok_or_else(|| anyhow!("row is missing column: {}", READING_FIELDS[field]))
    }
}

#[derive(Debug)]
pub struct CsvReadingIter {
    reader: Reader<File>,
    columns: Columns,
    site_name: Option<String>,
    line: u64,
}

impl CsvReadingIter {
    pub fn new(file: File, site_name: Option<String>) -> Result<Self> {
        if site_name.as_deref().is_some_and(|s| s.trim().is_empty()) {
            bail!("site name override must not be blank");
        }

        let mut reader = Reader::from_reader(file);
        let header = reader.headers().context("failed to read CSV header")?;
        let columns = Columns::from_header(header)?;

        Ok(Self {
            reader,
            columns,
            site_name,
            line: 1,
        })
    }

    /// Builds the row as a submission payload so it passes the same validator
    /// as the HTTP endpoint.
    fn parse_row(&self, row: &StringRecord) -> Result<NewReading> {
        let mut payload = Map::with_capacity(READING_FIELDS.len());
        let fields = READING_FIELDS.into_iter().zip(READING_FIELD_KINDS);
        for (field, (name, kind)) in fields.enumerate() {
            let cell = self.columns.get(row, field)?;
            let value = match kind {
                FieldKind::Text => Value::String(cell.to_string()),
                // Unparseable cells stay strings so validation reports the type mismatch.
                FieldKind::Number => cell
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::String(cell.to_string())),
            };
            payload.insert(name.to_string(), value);
        }

        if let Some(site_name) = &self.site_name {
            payload.insert("site_name".to_string(), Value::String(site_name.clone()));
        }

        Ok(validate(&payload)?)
    }
}

impl Iterator for CsvReadingIter {
    type Item = Result<NewReading>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut row = StringRecord::new();
        let read = match self.reader.read_record(&mut row) {
            Ok(read) => read,
            Err(e) => return Some(Err(e.into())),
        };
        if !read {
            return None;
        }
        self.line += 1;

        let line = self.line;
        Some(
            self.parse_row(&row)
                .with_context(|| format!("invalid reading on line {line}")),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn iter_for(contents: &str, site_name: Option<&str>) -> Result<CsvReadingIter> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(contents.as_bytes())?;
        CsvReadingIter::new(file.reopen()?, site_name.map(str::to_string))
    }

    #[test]
    fn reads_rows_in_any_column_order() -> Result<()> {
        let rows: Vec<NewReading> = iter_for(
            "site_name,datetime,latitude,longitude,mpsqa,temperature,pressure,humidity\n\
             Obs1,2024-05-01 21:00:00,40.1,-74.2,21.5,15.2,1012.4,55\n\
             Obs1,2024-05-01 21:01:00,40.1,-74.2,21.6,15.1,1012.3,56\n",
            None,
        )?
        .collect::<Result<_>>()?;

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].datetime, "2024-05-01 21:00:00");
        assert_eq!(rows[0].site_name, "Obs1");
        assert_eq!(rows[0].humidity, 55.0);
        assert_eq!(rows[1].mpsqa, 21.6);
        Ok(())
    }

    #[test]
    fn site_name_override_replaces_column() -> Result<()> {
        let rows: Vec<NewReading> = iter_for(
            "datetime,site_name,latitude,longitude,mpsqa,temperature,pressure,humidity\n\
             2024-05-01 21:00:00,,40.1,-74.2,21.5,15.2,1012.4,55\n",
            Some("Backyard"),
        )?
        .collect::<Result<_>>()?;

        assert_eq!(rows[0].site_name, "Backyard");
        Ok(())
    }

    #[test]
    fn blank_site_name_override_is_an_error() {
        let contents = "datetime,site_name,latitude,longitude,mpsqa,temperature,pressure,humidity\n\
                        2024-05-01 21:00:00,Obs1,40.1,-74.2,21.5,15.2,1012.4,55\n";

        for blank in ["", "   "] {
            let err = iter_for(contents, Some(blank)).unwrap_err();
            assert!(err.to_string().contains("must not be blank"), "{err:#}");
        }
    }

    #[test]
    fn empty_site_name_cell_is_rejected() -> Result<()> {
        let mut iter = iter_for(
            "datetime,site_name,latitude,longitude,mpsqa,temperature,pressure,humidity\n\
             2024-05-01 21:00:00,  ,40.1,-74.2,21.5,15.2,1012.4,55\n",
            None,
        )?;

        let message = format!("{:#}", iter.next().unwrap().unwrap_err());
        assert!(message.contains("line 2"), "{message}");
        assert!(message.contains("site_name"), "{message}");
        Ok(())
    }

    #[test]
    fn non_finite_number_is_rejected() -> Result<()> {
        let mut iter = iter_for(
            "datetime,site_name,latitude,longitude,mpsqa,temperature,pressure,humidity\n\
             2024-05-01 21:00:00,Obs1,40.1,-74.2,NaN,15.2,1012.4,55\n",
            None,
        )?;

        let message = format!("{:#}", iter.next().unwrap().unwrap_err());
        assert!(message.contains("mpsqa"), "{message}");
        Ok(())
    }

    #[test]
    fn missing_header_column_is_an_error() {
        let err = iter_for("datetime,site_name,latitude\n", None).unwrap_err();
        assert!(err.to_string().contains("longitude"));
    }

    #[test]
    fn bad_number_reports_line() -> Result<()> {
        let mut iter = iter_for(
            "datetime,site_name,latitude,longitude,mpsqa,temperature,pressure,humidity\n\
             2024-05-01 21:00:00,Obs1,40.1,-74.2,bright,15.2,1012.4,55\n",
            None,
        )?;

        let err = iter.next().unwrap().unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("line 2"), "{message}");
        assert!(message.contains("mpsqa"), "{message}");
        Ok(())
    }
}
