//! Python bindings (`python` feature)

use crate::config::QaBits;
use crate::core::cloud_mask::cloud_mask_for;
use crate::core::geometry_filter::Roi;
use crate::core::sampling::SamplingGrid;
use crate::core::water_index::normalized_difference_value;
use crate::scene::MaskedBand;
use crate::types::*;
use geo::{LineString, Polygon};
use ndarray::Zip;
use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
use pyo3::prelude::*;

fn runtime_error(e: WaterError) -> PyErr {
    PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", e))
}

fn parse_family(name: &str) -> PyResult<SensorFamily> {
    match name.to_uppercase().as_str() {
        "TM" | "LEGACY" | "L4" | "L5" | "LT04" | "LT05" => Ok(SensorFamily::Legacy),
        "OLI" | "L8" | "LC08" => Ok(SensorFamily::Oli),
        _ => Err(PyErr::new::<pyo3::exceptions::PyValueError, _>(
            format!("Invalid sensor family: {}", name)
        )),
    }
}

/// (a - b) / (a + b) with NaN where the denominator is zero
#[pyfunction]
fn normalized_difference<'py>(
    py: Python<'py>,
    a: PyReadonlyArray2<'py, f32>,
    b: PyReadonlyArray2<'py, f32>,
) -> PyResult<&'py PyArray2<f32>> {
    let (a, b) = (a.as_array(), b.as_array());
    if a.dim() != b.dim() {
        return Err(runtime_error(WaterError::ShapeMismatch {
            expected: a.dim(),
            found: b.dim(),
        }));
    }

    let index = Zip::from(&a)
        .and(&b)
        .map_collect(|&x, &y| normalized_difference_value(x, y).unwrap_or(f32::NAN));
    Ok(index.into_pyarray(py))
}

/// Clear-sky validity from a `pixel_qa` array
#[pyfunction]
fn cloud_mask<'py>(
    py: Python<'py>,
    qa: PyReadonlyArray2<'py, u16>,
    family: &str,
) -> PyResult<&'py PyArray2<bool>> {
    let family = parse_family(family)?;
    let qa = MaskedBand::new(qa.as_array().mapv(|v| v as BandReal));
    let valid = cloud_mask_for(family, QaBits::default()).validity(&qa);
    Ok(valid.into_pyarray(py))
}

/// Pixel-count reservoir area of a single-ring polygon in a projected CRS
#[pyfunction]
#[pyo3(signature = (exterior, scale = 30.0, epsg = 3763))]
fn reservoir_area(exterior: Vec<(f64, f64)>, scale: f64, epsg: u32) -> PyResult<f64> {
    let polygon = Polygon::new(LineString::from(exterior), vec![]);
    let roi = Roi::from_polygon(polygon, CoordinateSystem::Projected { epsg }).map_err(runtime_error)?;
    let grid = SamplingGrid::from_roi(&roi, scale).map_err(runtime_error)?;
    Ok(grid.reservoir_area())
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(normalized_difference, m)?)?;
    m.add_function(wrap_pyfunction!(cloud_mask, m)?)?;
    m.add_function(wrap_pyfunction!(reservoir_area, m)?)?;
    Ok(())
}
