use midir::{MidiOutput, MidiOutputConnection, MidiOutputPort};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::receiver::{MidiReceiver, ReceiverSelector};

enum State {
    Idle(MidiOutput),
    Open {
        index: usize,
        conn: MidiOutputConnection,
    },
    // Only seen while swapping between the other two.
    Swapping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameMatch {
    Exact,
    Contains,
}

fn find_port<'a>(
    mut names: impl Iterator<Item = &'a str>,
    wanted: &str,
    how: NameMatch,
) -> Option<usize> {
    names.position(|name| match how {
        NameMatch::Exact => name == wanted,
        NameMatch::Contains => name.contains(wanted),
    })
}

#[derive(Debug, PartialEq, Eq)]
enum Selection {
    Keep,
    Disconnect,
    Connect(usize),
}

fn resolve_selection(
    current: Option<usize>,
    requested: Option<usize>,
    port_count: usize,
) -> Result<Selection> {
    match requested {
        None => Ok(Selection::Disconnect),
        Some(index) if index >= port_count => Err(Error::NoSuchPort(index)),
        Some(index) if current == Some(index) => Ok(Selection::Keep),
        Some(index) => Ok(Selection::Connect(index)),
    }
}

/// Chooses which MIDI output port the keyboard plays into.
pub struct PortSelector {
    client_name: String,
    state: State,
    ports: Vec<(MidiOutputPort, String)>,
}

impl PortSelector {
    pub fn new(client_name: &str) -> Result<Self> {
        let output = MidiOutput::new(client_name)?;
        let mut selector = Self {
            client_name: client_name.to_string(),
            state: State::Idle(output),
            ports: Vec::new(),
        };
        selector.refresh()?;
        Ok(selector)
    }

    /// Re-enumerates the output ports. An open connection is re-established
    /// if its port is still present.
    pub fn refresh(&mut self) -> Result<()> {
        let reconnect = self.selected().map(|(_, name)| name.to_string());
        self.disconnect();

        if let State::Idle(output) = &self.state {
            self.ports = output
                .ports()
                .into_iter()
                .map(|port| -> Result<_> {
                    let name = output.port_name(&port)?;
                    Ok((port, name))
                })
                .collect::<Result<Vec<_>>>()?;
            info!(count = self.ports.len(), "found MIDI output ports");
        }

        if let Some(name) = reconnect {
            match find_port(self.port_names(), &name, NameMatch::Exact) {
                Some(index) => self.select(Some(index))?,
                None => warn!(port = %name, "previously selected port disappeared"),
            }
        }
        Ok(())
    }

    pub fn port_names(&self) -> impl Iterator<Item = &str> {
        self.ports.iter().map(|(_, name)| name.as_str())
    }

    pub fn selected(&self) -> Option<(usize, &str)> {
        match &self.state {
            State::Open { index, .. } => self
                .ports
                .get(*index)
                .map(|(_, name)| (*index, name.as_str())),
            _ => None,
        }
    }

    /// Connects to the port at `index`, or disconnects when `None`.
    pub fn select(&mut self, index: Option<usize>) -> Result<()> {
        let current = self.selected().map(|(i, _)| i);
        let index = match resolve_selection(current, index, self.ports.len())? {
            Selection::Keep => return Ok(()),
            Selection::Disconnect => {
                self.disconnect();
                return Ok(());
            }
            Selection::Connect(index) => index,
        };
        self.disconnect();
        let (port, name) = self.ports.get(index).ok_or(Error::NoSuchPort(index))?;

        match std::mem::replace(&mut self.state, State::Swapping) {
            State::Idle(output) => {
                match output.connect(port, &format!("{}-out", self.client_name)) {
                    Ok(conn) => {
                        info!(port = %name, "connected MIDI output");
                        self.state = State::Open { index, conn };
                        Ok(())
                    }
                    Err(e) => {
                        let reason = e.to_string();
                        self.state = State::Idle(e.into_inner());
                        Err(Error::Connect {
                            port: name.clone(),
                            reason,
                        })
                    }
                }
            }
            other => {
                self.state = other;
                Ok(())
            }
        }
    }

    /// Connects to the first port whose name contains `fragment`.
    pub fn select_by_name(&mut self, fragment: &str) -> Result<bool> {
        match find_port(self.port_names(), fragment, NameMatch::Contains) {
            Some(index) => {
                self.select(Some(index))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn disconnect(&mut self) {
        match std::mem::replace(&mut self.state, State::Swapping) {
            State::Open { index, conn } => {
                if let Some((_, name)) = self.ports.get(index) {
                    info!(port = %name, "disconnected MIDI output");
                }
                self.state = State::Idle(conn.close());
            }
            other => self.state = other,
        }
    }
}

impl ReceiverSelector for PortSelector {
    fn receiver(&mut self) -> Option<&mut dyn MidiReceiver> {
        match &mut self.state {
            State::Open { conn, .. } => Some(conn as &mut dyn MidiReceiver),
            _ => None,
        }
    }

    fn close(&mut self) {
        debug!("closing port selector");
        self.disconnect();
    }
}

impl Drop for PortSelector {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: [&str; 3] = ["USB MIDI 2", "USB MIDI", "FluidSynth:Synth input port"];

    #[test]
    fn exact_lookup_ignores_longer_names() {
        assert_eq!(find_port(NAMES.into_iter(), "USB MIDI", NameMatch::Exact), Some(1));
        assert_eq!(find_port(NAMES.into_iter(), "USB", NameMatch::Exact), None);
    }

    #[test]
    fn substring_lookup_takes_first_match() {
        assert_eq!(find_port(NAMES.into_iter(), "USB MIDI", NameMatch::Contains), Some(0));
        assert_eq!(find_port(NAMES.into_iter(), "Fluid", NameMatch::Contains), Some(2));
        assert_eq!(find_port(NAMES.into_iter(), "Yamaha", NameMatch::Contains), None);
    }

    #[test]
    fn selecting_none_disconnects() {
        assert_eq!(resolve_selection(Some(1), None, 3).unwrap(), Selection::Disconnect);
        assert_eq!(resolve_selection(None, None, 0).unwrap(), Selection::Disconnect);
    }

    #[test]
    fn selecting_past_the_end_is_an_error() {
        assert!(matches!(
            resolve_selection(None, Some(3), 3),
            Err(Error::NoSuchPort(3))
        ));
        assert!(matches!(
            resolve_selection(Some(0), Some(7), 0),
            Err(Error::NoSuchPort(7))
        ));
    }

    #[test]
    fn reselecting_the_open_port_keeps_it() {
        assert_eq!(resolve_selection(Some(2), Some(2), 3).unwrap(), Selection::Keep);
        assert_eq!(resolve_selection(Some(2), Some(0), 3).unwrap(), Selection::Connect(0));
    }
}
