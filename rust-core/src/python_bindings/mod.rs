//! PyO3 bindings for Python integration

use pyo3::prelude::*;

mod client_bindings;

/// Python module definition
#[pymodule]
fn jacked(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<client_bindings::PyJackAudio>()?;

    m.add_function(wrap_pyfunction!(client_bindings::easy_client, m)?)?;
    m.add_function(wrap_pyfunction!(client_bindings::get_client, m)?)?;
    m.add_function(wrap_pyfunction!(client_bindings::port_map, m)?)?;

    Ok(())
}
