//! Load the joint position and joint angle tables that Sports2D writes next
//! to an analyzed video.
//!
//! Position tables use the OpenSim `.trc` layout, angle tables the OpenSim
//! `.mot` layout. Both are tab separated text. The parsed tables are
//! assembled into a [`TimeSeriesStore`], which is immutable once built and
//! can be shared between threads.

mod mot;
mod paths;
mod store;
mod trc;

pub use mot::{MotTable, parse_mot};
pub use paths::{AnalysisOutputPaths, AnalysisSource};
pub use store::{
    DEFAULT_SELECT_RADIUS_PX, JointSummary, LoadOptions, StoreSummary, TimeSeriesStore,
};
pub use trc::{TrcHeader, TrcTable, parse_trc};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("format error: {0}")]
    Format(String),
    #[error("\"{0}\" not found")]
    NotFound(String),
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("csv error: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },
}

impl From<motion_types::FrameOrderError> for Error {
    fn from(orig: motion_types::FrameOrderError) -> Self {
        Error::Format(orig.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Parse one table cell. Empty cells are missing values.
fn parse_value(field: &str, row: usize, column: &str) -> Result<f64> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(f64::NAN);
    }
    field.parse().map_err(|_| {
        Error::Format(format!(
            "row {row}, column \"{column}\": cannot parse \"{field}\" as a number"
        ))
    })
}

/// Undecodable bytes are a malformed table, not an I/O failure.
fn table_error(err: csv::Error, what: &str) -> Error {
    match err.kind() {
        csv::ErrorKind::Utf8 { .. } => Error::Format(format!("{what}: {err}")),
        csv::ErrorKind::Io(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            Error::Format(format!("{what}: {err}"))
        }
        _ => Error::from(err),
    }
}

/// Read one header line, failing on a premature end of file.
fn read_header_line<R: std::io::BufRead>(rdr: &mut R, what: &str) -> Result<String> {
    let mut line = String::new();
    let n = rdr.read_line(&mut line).map_err(|e| match e.kind() {
        std::io::ErrorKind::InvalidData => Error::Format(format!("{what}: {e}")),
        _ => Error::from(e),
    })?;
    if n == 0 {
        return Err(Error::Format(format!(
            "unexpected end of file while reading {what}"
        )));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
