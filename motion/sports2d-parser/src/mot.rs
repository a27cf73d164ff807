use std::io::BufRead;

use crate::{Error, Result, parse_value, read_header_line, table_error};

const END_HEADER: &str = "endheader";
const TIME_COLUMN: &str = "time";

/// A fully parsed `.mot` table. Angles are always in degrees.
#[derive(Debug, Clone)]
pub struct MotTable {
    pub angle_names: Vec<String>,
    pub times: Vec<f64>,
    /// `columns[i][row]` is angle `i` in degrees.
    pub columns: Vec<Vec<f64>>,
}

impl MotTable {
    pub fn num_rows(&self) -> usize {
        self.times.len()
    }
}

pub fn parse_mot<R: BufRead>(mut rdr: R) -> Result<MotTable> {
    let mut in_degrees = true;
    loop {
        let line = read_header_line(&mut rdr, "header (no \"endheader\" line)")?;
        let line = line.trim();
        if line == END_HEADER {
            break;
        }
        if let Some(value) = line.strip_prefix("inDegrees=") {
            in_degrees = !value.trim().eq_ignore_ascii_case("no");
        }
    }

    let mut csv_rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(rdr);

    let headers = csv_rdr
        .headers()
        .map_err(|e| table_error(e, "angle table header"))?
        .clone();
    let mut columns_iter = headers.iter().map(str::trim);
    match columns_iter.next() {
        Some(first) if first.eq_ignore_ascii_case(TIME_COLUMN) => {}
        _ => {
            return Err(Error::Format(format!(
                "missing required column \"{TIME_COLUMN}\""
            )));
        }
    }
    let angle_names: Vec<String> = columns_iter.map(str::to_string).collect();
    if angle_names.iter().any(String::is_empty) {
        return Err(Error::Format("empty angle column name".into()));
    }

    let mut times: Vec<f64> = Vec::new();
    let mut columns = vec![Vec::new(); angle_names.len()];
    let mut row = 0;
    for record in csv_rdr.records() {
        let record = record.map_err(|e| table_error(e, "angle table"))?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        if record.len() < angle_names.len() + 1 {
            return Err(Error::Format(format!(
                "data row {row} has {} columns, expected {}",
                record.len(),
                angle_names.len() + 1
            )));
        }
        let time = parse_value(&record[0], row, TIME_COLUMN)?;
        if let Some(&previous) = times.last() {
            if !(time > previous) {
                return Err(Error::Format(format!(
                    "time {time} in data row {row} does not follow time {previous}"
                )));
            }
        }
        times.push(time);
        for (i, name) in angle_names.iter().enumerate() {
            let value = parse_value(&record[i + 1], row, name)?;
            columns[i].push(if in_degrees { value } else { value.to_degrees() });
        }
        row += 1;
    }

    Ok(MotTable {
        angle_names,
        times,
        columns,
    })
}
