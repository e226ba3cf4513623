use crate::domain::{CellGrid, GridSpec};
use crate::io::grid_ascii::{read_grid, read_grid_checked, write_grid};

fn temp_path(name: &str) -> String {
    let mut p = std::env::temp_dir();
    p.push(format!("trex_grid_test_{}_{}", std::process::id(), name));
    p.to_string_lossy().into_owned()
}

/*
Writing a grid and reading it back reproduces the header and every
value exactly.
 */
#[test]
fn test_grid_roundtrip() {
    let spec = GridSpec {
        nrows: 3,
        ncols: 4,
        w: 30.0,
        xllcorner: 500.0,
        yllcorner: 1500.0,
        nodata: -9999.0,
    };
    let mut grid = CellGrid::filled(3, 4, 0.0);
    for i in 0..grid.data.len() {
        grid.data[i] = i as f64 * 0.125 - 1.0;
    }

    let path = temp_path("roundtrip.asc");
    write_grid(&path, &spec, &grid).unwrap();
    let (back_spec, back) = read_grid(&path).unwrap();

    assert_eq!(back_spec.nrows, 3);
    assert_eq!(back_spec.ncols, 4);
    assert_eq!(back_spec.w, 30.0);
    assert_eq!(back_spec.nodata, -9999.0);
    for i in 0..grid.data.len() {
        assert_eq!(grid.data[i], back.data[i], "value {} changed", i);
    }
    let _ = std::fs::remove_file(&path);
}

/*
A grid whose header disagrees with the mask dimensions is a fatal
input error naming the file.
 */
#[test]
fn test_dimension_mismatch() {
    let spec = GridSpec {
        nrows: 2,
        ncols: 2,
        w: 10.0,
        nodata: -9999.0,
        ..Default::default()
    };
    let grid = CellGrid::filled(2, 2, 1.0);
    let path = temp_path("mismatch.asc");
    write_grid(&path, &spec, &grid).unwrap();

    let expected = GridSpec {
        nrows: 3,
        ncols: 2,
        w: 10.0,
        nodata: -9999.0,
        ..Default::default()
    };
    let result = read_grid_checked(&path, &expected);
    assert!(result.is_err());
    let msg: String = result.err().unwrap().into();
    assert!(msg.contains("mismatch.asc"), "error does not name the file: {}", msg);
    let _ = std::fs::remove_file(&path);
}

/*
A malformed header key is rejected.
 */
#[test]
fn test_bad_header() {
    let path = temp_path("badheader.asc");
    std::fs::write(&path, "ncols 2\nwrong 2\n").unwrap();
    let result = read_grid(&path);
    assert!(result.is_err());
    let _ = std::fs::remove_file(&path);
}
