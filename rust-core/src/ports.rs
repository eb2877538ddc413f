//! Port naming and default port maps
//!
//! JACK addresses ports as `client:port`. The helpers here build the
//! default maps that pair this client's `in_N`/`out_N` ports with the
//! hardware ports exposed by the `system` client.

/// Client that owns the hardware capture/playback ports
pub const DEFAULT_CLIENT: &str = "system";

/// Direction of a port as seen from this client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    /// Receives audio (capture)
    Input,
    /// Sends audio (playback)
    Output,
}

impl PortDirection {
    fn local_template(self) -> &'static str {
        match self {
            PortDirection::Input => "in_",
            PortDirection::Output => "out_",
        }
    }

    fn remote_template(self) -> &'static str {
        match self {
            PortDirection::Input => "capture_",
            PortDirection::Output => "playback_",
        }
    }
}

/// One local port and the remote port it gets wired to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    /// Short name registered on this client, e.g. `in_1`
    pub local: String,
    /// Full id of the remote port, e.g. `system:capture_1`
    pub remote: String,
}

impl PortMapping {
    pub fn new(local: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            remote: remote.into(),
        }
    }

    /// Source and destination ids for connecting this mapping
    ///
    /// Outputs flow from our port to the remote one, inputs the other way.
    pub fn connection(&self, own_client: &str, direction: PortDirection) -> (String, String) {
        let own = port_id(own_client, &self.local);
        match direction {
            PortDirection::Output => (own, self.remote.clone()),
            PortDirection::Input => (self.remote.clone(), own),
        }
    }
}

impl<L: Into<String>, R: Into<String>> From<(L, R)> for PortMapping {
    fn from((local, remote): (L, R)) -> Self {
        Self::new(local, remote)
    }
}

/// Format a full JACK port id
pub fn port_id(client_name: &str, port_name: &str) -> String {
    format!("{}:{}", client_name, port_name)
}

/// Default map of `count` ports against the `system` client
pub fn port_map(count: usize, direction: PortDirection) -> Vec<PortMapping> {
    port_map_for(DEFAULT_CLIENT, count, direction)
}

/// Default map of `count` ports against an arbitrary remote client
pub fn port_map_for(client_name: &str, count: usize, direction: PortDirection) -> Vec<PortMapping> {
    (1..=count)
        .map(|i| PortMapping {
            local: format!("{}{}", direction.local_template(), i),
            remote: port_id(
                client_name,
                &format!("{}{}", direction.remote_template(), i),
            ),
        })
        .collect()
}
