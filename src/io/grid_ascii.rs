use crate::domain::{CellGrid, GridSpec};
use std::fs;
use std::path::Path;

//ESRI ASCII raster files.  Every grid carries the same six header
//records in fixed order (ncols, nrows, xllcorner, yllcorner,
//cellsize, NODATA_value) followed by nrows lines of ncols values.
//Auxiliary grids must agree with the mask header; a mismatch is a
//fatal input error naming the file.

#[derive(Debug)]
pub enum GridError {
    OpenFileError(String),
    HeaderError(String, String),
    DimensionError(String, String),
    ValueError(String, String),
    WriteError(String),
}

impl From<GridError> for String {
    fn from(error: GridError) -> Self {
        match error {
            GridError::OpenFileError(f) => format!("Can't open grid file: {}", f),
            GridError::HeaderError(f, msg) => format!("Grid file '{}' header error: {}", f, msg),
            GridError::DimensionError(f, msg) => {
                format!("Grid file '{}' dimension error: {}", f, msg)
            }
            GridError::ValueError(f, msg) => format!("Grid file '{}' value error: {}", f, msg),
            GridError::WriteError(f) => format!("Error writing grid file: {}", f),
        }
    }
}

const HEADER_KEYS: [&str; 6] = [
    "ncols",
    "nrows",
    "xllcorner",
    "yllcorner",
    "cellsize",
    "NODATA_value",
];

/// Read the header and values of an ESRI ASCII grid.
pub fn read_grid(filename: &str) -> Result<(GridSpec, CellGrid<f64>), GridError> {
    let content = fs::read_to_string(filename)
        .map_err(|_| GridError::OpenFileError(filename.to_string()))?;
    let mut tokens = content.split_whitespace();

    let mut header = [0.0f64; 6];
    for (i, key) in HEADER_KEYS.iter().enumerate() {
        let name = tokens.next().ok_or_else(|| {
            GridError::HeaderError(filename.to_string(), format!("missing '{}' record", key))
        })?;
        if !name.eq_ignore_ascii_case(key) {
            return Err(GridError::HeaderError(
                filename.to_string(),
                format!("expected '{}' but found '{}'", key, name),
            ));
        }
        let value = tokens.next().ok_or_else(|| {
            GridError::HeaderError(filename.to_string(), format!("missing value for '{}'", key))
        })?;
        header[i] = value.parse().map_err(|_| {
            GridError::HeaderError(
                filename.to_string(),
                format!("bad value '{}' for '{}'", value, key),
            )
        })?;
    }

    let ncols = header[0] as usize;
    let nrows = header[1] as usize;
    if ncols == 0 || nrows == 0 {
        return Err(GridError::DimensionError(
            filename.to_string(),
            format!("{} rows x {} cols", nrows, ncols),
        ));
    }
    let spec = GridSpec {
        nrows,
        ncols,
        w: header[4],
        xllcorner: header[2],
        yllcorner: header[3],
        nodata: header[5],
    };

    let mut grid = CellGrid::filled(nrows, ncols, spec.nodata);
    for i in 0..nrows * ncols {
        let token = tokens.next().ok_or_else(|| {
            GridError::ValueError(
                filename.to_string(),
                format!("expected {} values but found {}", nrows * ncols, i),
            )
        })?;
        grid.data[i] = token.parse().map_err(|_| {
            GridError::ValueError(filename.to_string(), format!("bad value '{}'", token))
        })?;
    }

    Ok((spec, grid))
}

/// Read a grid whose header must match the domain specification.
pub fn read_grid_checked(filename: &str, spec: &GridSpec) -> Result<CellGrid<f64>, GridError> {
    let (gspec, grid) = read_grid(filename)?;
    if gspec.nrows != spec.nrows || gspec.ncols != spec.ncols || gspec.w != spec.w {
        return Err(GridError::DimensionError(
            filename.to_string(),
            format!(
                "grid is {} rows x {} cols at {} m but the mask is {} rows x {} cols at {} m",
                gspec.nrows, gspec.ncols, gspec.w, spec.nrows, spec.ncols, spec.w
            ),
        ));
    }
    Ok(grid)
}

/// Write an ESRI ASCII grid with the domain header.
pub fn write_grid(filename: &str, spec: &GridSpec, grid: &CellGrid<f64>) -> Result<(), GridError> {
    let mut out = String::new();
    out.push_str(&format!("ncols {}\n", spec.ncols));
    out.push_str(&format!("nrows {}\n", spec.nrows));
    out.push_str(&format!("xllcorner {}\n", spec.xllcorner));
    out.push_str(&format!("yllcorner {}\n", spec.yllcorner));
    out.push_str(&format!("cellsize {}\n", spec.w));
    out.push_str(&format!("NODATA_value {}\n", spec.nodata));
    for row in 0..spec.nrows {
        for col in 0..spec.ncols {
            if col > 0 {
                out.push(' ');
            }
            out.push_str(&format!("{}", grid.at(row, col)));
        }
        out.push('\n');
    }
    fs::write(Path::new(filename), out).map_err(|_| GridError::WriteError(filename.to_string()))
}
