use std::{collections::BTreeMap, io::BufRead};

use serde::Serialize;

use crate::{Error, Result, parse_value, read_header_line, table_error};

const FRAME_COLUMN: &str = "Frame#";
const TIME_COLUMN: &str = "Time";

/// The key/value block at the top of a `.trc` file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrcHeader {
    pub data_rate: f64,
    pub camera_rate: Option<f64>,
    pub num_frames: Option<usize>,
    pub num_markers: Option<usize>,
    pub units: Option<String>,
}

/// A fully parsed `.trc` table. Z coordinates are dropped.
#[derive(Debug, Clone)]
pub struct TrcTable {
    pub header: TrcHeader,
    pub marker_names: Vec<String>,
    pub frames: Vec<u64>,
    pub times: Vec<f64>,
    /// `xs[i][row]` is the x coordinate of marker `i`.
    pub xs: Vec<Vec<f64>>,
    pub ys: Vec<Vec<f64>>,
}

impl TrcTable {
    pub fn num_rows(&self) -> usize {
        self.frames.len()
    }
}

pub fn parse_trc<R: BufRead>(mut rdr: R) -> Result<TrcTable> {
    let _path_file_type = read_header_line(&mut rdr, "PathFileType line")?;
    let keys = read_header_line(&mut rdr, "header keys")?;
    let values = read_header_line(&mut rdr, "header values")?;
    let header = parse_header(&keys, &values)?;

    let names_line = read_header_line(&mut rdr, "marker names")?;
    let marker_names = parse_marker_names(&names_line)?;
    if let Some(expected) = header.num_markers {
        if expected != marker_names.len() {
            return Err(Error::Format(format!(
                "header declares {expected} markers but {} marker names were found",
                marker_names.len()
            )));
        }
    }
    let _axes = read_header_line(&mut rdr, "coordinate labels")?;

    let n_markers = marker_names.len();
    // The z column of the last marker may be absent.
    let required_columns = if n_markers == 0 { 2 } else { 3 * n_markers + 1 };

    let mut frames: Vec<u64> = Vec::new();
    let mut times = Vec::new();
    let mut xs = vec![Vec::new(); n_markers];
    let mut ys = vec![Vec::new(); n_markers];

    let mut csv_rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(rdr);

    let mut row = 0;
    for record in csv_rdr.records() {
        let record = record.map_err(|e| table_error(e, "position table"))?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        if record.len() < required_columns {
            return Err(Error::Format(format!(
                "data row {row} has {} columns, expected at least {required_columns}",
                record.len()
            )));
        }

        let frame = parse_frame(&record[0], row)?;
        if let Some(&previous) = frames.last() {
            if frame <= previous {
                return Err(Error::Format(format!(
                    "frame index {frame} in data row {row} does not follow frame {previous}"
                )));
            }
        }
        frames.push(frame);
        times.push(parse_value(&record[1], row, TIME_COLUMN)?);

        for (i, name) in marker_names.iter().enumerate() {
            xs[i].push(parse_value(&record[2 + 3 * i], row, name)?);
            ys[i].push(parse_value(&record[3 + 3 * i], row, name)?);
        }
        row += 1;
    }

    if let Some(num_frames) = header.num_frames {
        if num_frames != frames.len() {
            tracing::warn!(
                "header declares {num_frames} frames but {} data rows were read",
                frames.len()
            );
        }
    }

    Ok(TrcTable {
        header,
        marker_names,
        frames,
        times,
        xs,
        ys,
    })
}

fn parse_header(keys: &str, values: &str) -> Result<TrcHeader> {
    let map: BTreeMap<&str, &str> = keys
        .split('\t')
        .map(str::trim)
        .zip(values.split('\t').map(str::trim))
        .filter(|(k, _)| !k.is_empty())
        .collect();

    let data_rate: f64 = map
        .get("DataRate")
        .ok_or_else(|| Error::Format("header lacks required key \"DataRate\"".into()))?
        .parse()
        .map_err(|_| Error::Format("cannot parse \"DataRate\"".into()))?;
    if !(data_rate.is_finite() && data_rate > 0.0) {
        return Err(Error::Format(format!("invalid DataRate {data_rate}")));
    }

    Ok(TrcHeader {
        data_rate,
        camera_rate: map.get("CameraRate").and_then(|v| v.parse().ok()),
        num_frames: map.get("NumFrames").and_then(|v| v.parse().ok()),
        num_markers: map.get("NumMarkers").and_then(|v| v.parse().ok()),
        units: map.get("Units").map(|v| v.to_string()),
    })
}

fn parse_marker_names(line: &str) -> Result<Vec<String>> {
    let mut fields = line.split('\t').map(str::trim);
    for required in [FRAME_COLUMN, TIME_COLUMN] {
        if fields.next() != Some(required) {
            return Err(Error::Format(format!(
                "missing required column \"{required}\""
            )));
        }
    }
    let mut names: Vec<String> = Vec::new();
    for name in fields.filter(|f| !f.is_empty()) {
        if names.iter().any(|n| n == name) {
            return Err(Error::Format(format!("duplicate marker name \"{name}\"")));
        }
        names.push(name.to_string());
    }
    Ok(names)
}

fn parse_frame(field: &str, row: usize) -> Result<u64> {
    let field = field.trim();
    if let Ok(frame) = field.parse::<u64>() {
        return Ok(frame);
    }
    // Some writers store the frame number as a float.
    match field.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => Ok(f as u64),
        _ => Err(Error::Format(format!(
            "data row {row}: invalid frame index \"{field}\""
        ))),
    }
}
