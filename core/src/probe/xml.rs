//! Streaming parser for the engine's XML report (`-oX`).

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{HostReport, HostStatus, OsMatch, PortReport, ProbeOutput, ScriptOutput};

#[derive(Default)]
struct ParseState {
    saw_root: bool,
    host: Option<HostReport>,
    host_addr: Option<IpAddr>,
    port: Option<PortReport>,
    hosts: Vec<HostReport>,
}

impl ParseState {
    fn open(&mut self, tag: &[u8], attrs: HashMap<String, String>) {
        match tag {
            b"nmaprun" => self.saw_root = true,
            b"host" => {
                self.host = Some(HostReport::new(
                    IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    HostStatus::Unknown,
                ));
                self.host_addr = None;
            }
            b"status" => {
                if let (Some(host), Some(state)) = (self.host.as_mut(), attrs.get("state")) {
                    host.status = HostStatus::from(state.as_str());
                }
            }
            b"address" => self.address(attrs),
            b"hostname" => {
                if let Some(host) = self.host.as_mut() {
                    if host.hostname.is_none() {
                        host.hostname = attrs.get("name").cloned();
                    }
                }
            }
            b"port" => {
                let port = attrs.get("portid").and_then(|p| p.parse::<u16>().ok());
                self.port = port.map(|port| PortReport {
                    port,
                    protocol: attrs.get("protocol").cloned().unwrap_or_else(|| "tcp".into()),
                    state: None,
                    service: None,
                    product: None,
                    version: None,
                    scripts: Vec::new(),
                });
            }
            b"state" => {
                if let Some(port) = self.port.as_mut() {
                    port.state = attrs.get("state").cloned();
                }
            }
            b"service" => {
                if let Some(port) = self.port.as_mut() {
                    port.service = attrs.get("name").cloned();
                    port.product = attrs.get("product").cloned();
                    port.version = attrs.get("version").cloned();
                }
            }
            b"osmatch" => {
                if let (Some(host), Some(name)) = (self.host.as_mut(), attrs.get("name")) {
                    host.os_matches.push(OsMatch {
                        name: name.clone(),
                        accuracy: attrs.get("accuracy").and_then(|a| a.parse().ok()),
                    });
                }
            }
            b"script" => {
                let Some(id) = attrs.get("id").cloned() else {
                    return;
                };
                let script = ScriptOutput {
                    id,
                    output: attrs.get("output").cloned().unwrap_or_default(),
                };
                if let Some(port) = self.port.as_mut() {
                    port.scripts.push(script);
                } else if let Some(host) = self.host.as_mut() {
                    host.scripts.push(script);
                }
            }
            _ => {}
        }
    }

    fn address(&mut self, attrs: HashMap<String, String>) {
        let Some(addr) = attrs.get("addr") else {
            return;
        };
        match attrs.get("addrtype").map(String::as_str) {
            Some("mac") => {
                if let Some(host) = self.host.as_mut() {
                    host.mac = Some(addr.clone());
                    host.vendor = attrs.get("vendor").cloned();
                }
            }
            _ => {
                if self.host_addr.is_none() {
                    self.host_addr = addr.parse().ok();
                }
            }
        }
    }

    fn close(&mut self, tag: &[u8]) {
        match tag {
            b"port" => {
                if let (Some(port), Some(host)) = (self.port.take(), self.host.as_mut()) {
                    host.ports.push(port);
                }
            }
            b"host" => {
                if let (Some(mut host), Some(addr)) = (self.host.take(), self.host_addr.take()) {
                    host.address = addr;
                    self.hosts.push(host);
                }
            }
            _ => {}
        }
    }
}

fn attributes(e: &BytesStart<'_>) -> HashMap<String, String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .filter_map(|attr| {
            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            attr.unescape_value().ok().map(|value| (key, value.to_string()))
        })
        .collect()
}

/// Parses an engine XML report. Hosts without an IP address are skipped.
pub fn parse_report(xml: &[u8]) -> Result<ProbeOutput, String> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut state = ParseState::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let attrs = attributes(&e);
                state.open(e.name().as_ref(), attrs);
            }
            Ok(Event::Empty(e)) => {
                let attrs = attributes(&e);
                let name = e.name();
                state.open(name.as_ref(), attrs);
                state.close(name.as_ref());
            }
            Ok(Event::End(e)) => state.close(e.name().as_ref()),
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "malformed engine output at byte {}: {e}",
                    reader.buffer_position()
                ));
            }
            _ => {}
        }
        buf.clear();
    }

    if !state.saw_root {
        return Err("engine output has no nmaprun element".into());
    }
    Ok(ProbeOutput::new(state.hosts))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
