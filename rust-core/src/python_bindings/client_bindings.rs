//! Python bindings for the capture/playback client

use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
use pyo3::exceptions::PyRuntimeError;
use pyo3::prelude::*;
use pyo3::types::PyAny;

use crate::audio::{self, JackAudio};
use crate::error::JackedError;
use crate::ports::{self, PortDirection, PortMapping};

fn to_py_err(err: JackedError) -> PyErr {
    PyRuntimeError::new_err(err.to_string())
}

fn to_mappings(map: Vec<(String, String)>) -> Vec<PortMapping> {
    map.into_iter().map(PortMapping::from).collect()
}

/// JACK client exposed to Python
///
/// Usable as a context manager; leaving the `with` block closes the client.
#[pyclass(name = "JackAudio", unsendable)]
pub struct PyJackAudio {
    client: Option<JackAudio>,
}

impl PyJackAudio {
    fn client(&mut self) -> PyResult<&mut JackAudio> {
        self.client
            .as_mut()
            .ok_or_else(|| PyRuntimeError::new_err("client is closed"))
    }

    fn client_ref(&self) -> PyResult<&JackAudio> {
        self.client
            .as_ref()
            .ok_or_else(|| PyRuntimeError::new_err("client is closed"))
    }
}

#[pymethods]
impl PyJackAudio {
    /// Open a client from explicit port maps
    ///
    /// Args:
    ///     name: Client name
    ///     inputs: List of (local port, remote port id), e.g. [("in_1", "system:capture_1")]
    ///     outputs: List of (local port, remote port id)
    #[new]
    fn new(
        name: &str,
        inputs: Vec<(String, String)>,
        outputs: Vec<(String, String)>,
    ) -> PyResult<Self> {
        let client =
            JackAudio::new(name, to_mappings(inputs), to_mappings(outputs)).map_err(to_py_err)?;
        Ok(Self {
            client: Some(client),
        })
    }

    #[getter]
    fn sample_rate(&self) -> PyResult<usize> {
        Ok(self.client_ref()?.sample_rate())
    }

    #[getter]
    fn buffer_size(&self) -> PyResult<usize> {
        Ok(self.client_ref()?.buffer_size())
    }

    #[getter]
    fn name(&self) -> PyResult<String> {
        Ok(self.client_ref()?.name().to_string())
    }

    /// Capture `sec` seconds of audio
    ///
    /// Returns:
    ///     float32 array of shape (input channels, sample_rate * sec)
    fn capture<'py>(&mut self, py: Python<'py>, sec: f64) -> PyResult<&'py PyArray2<f32>> {
        let captured = self.client()?.capture(sec).map_err(to_py_err)?;
        Ok(captured.into_pyarray(py))
    }

    /// Play a float32 array shaped (channels, samples)
    ///
    /// Args:
    ///     captured: Audio to play, assumed to be at the current sample rate
    ///     truncate: Drop surplus channels instead of mixing them down
    #[pyo3(signature = (captured, truncate=false))]
    fn play(&mut self, captured: PyReadonlyArray2<f32>, truncate: bool) -> PyResult<()> {
        self.client()?
            .play(captured.as_array(), truncate)
            .map_err(to_py_err)
    }

    /// Deactivate and detach the client
    fn close(&mut self) -> PyResult<()> {
        if let Some(client) = self.client.take() {
            client.close().map_err(to_py_err)?;
        }
        Ok(())
    }

    fn __enter__(slf: PyRef<'_, Self>) -> PyRef<'_, Self> {
        slf
    }

    fn __exit__(
        &mut self,
        _exc_type: &PyAny,
        _exc_value: &PyAny,
        _traceback: &PyAny,
    ) -> PyResult<bool> {
        self.close()?;
        Ok(false)
    }
}

/// Open a client wired to the first N system capture/playback ports
#[pyfunction]
pub fn easy_client(name: &str, channels_in: usize, channels_out: usize) -> PyResult<PyJackAudio> {
    let client = audio::easy_client(name, channels_in, channels_out).map_err(to_py_err)?;
    Ok(PyJackAudio {
        client: Some(client),
    })
}

/// Open a client from explicit (local port, remote port id) maps
#[pyfunction]
pub fn get_client(
    name: &str,
    input_map: Vec<(String, String)>,
    output_map: Vec<(String, String)>,
) -> PyResult<PyJackAudio> {
    PyJackAudio::new(name, input_map, output_map)
}

/// Default port map for `num_ports` ports against the system client
#[pyfunction]
pub fn port_map(num_ports: usize, is_output: bool) -> Vec<(String, String)> {
    let direction = if is_output {
        PortDirection::Output
    } else {
        PortDirection::Input
    };
    ports::port_map(num_ports, direction)
        .into_iter()
        .map(|m| (m.local, m.remote))
        .collect()
}
