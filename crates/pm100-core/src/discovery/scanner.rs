//! UDP discovery scanner.
//!
//! A scan binds the discovery port, broadcasts the discovery request a fixed
//! number of times and reports every datagram it receives until stopped.
//! Reset and update-config commands share the scan socket while a scan runs,
//! so replies to them reach the same receive loop. With no scan running they
//! go out on a command socket bound to the same port, created on first use.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::socket::create_reusable_socket;
use crate::config::DiscoveryConfig;
use crate::error::FormatError;
use crate::events::{Emitter, ScanEvent};
use crate::net::{broadcast_address, broadcast_targets, preferred_local_address};
use crate::protocol::{
    decode_discovery_response, encode_discovery_request, encode_reset, encode_update_config,
    hex_dump, parse_ipv4,
};
use crate::types::{RawDatagram, UpdateConfigRequest};

type CommandSlot = Arc<Mutex<Option<Arc<UdpSocket>>>>;

/// Discovers PM100 devices and sends them configuration commands.
///
/// Must be used from within a Tokio runtime.
pub struct DiscoveryScanner {
    config: DiscoveryConfig,
    events: Emitter<ScanEvent>,
    scan: Option<ActiveScan>,
    command: CommandSlot,
}

struct ActiveScan {
    task: JoinHandle<()>,
    socket: Arc<UdpSocket>,
}

impl DiscoveryScanner {
    /// Create an idle scanner and the receiver for its events.
    pub fn new(config: DiscoveryConfig) -> (Self, UnboundedReceiver<ScanEvent>) {
        let (events, rx) = Emitter::new("discovery");
        let scanner = Self {
            config,
            events,
            scan: None,
            command: Arc::new(Mutex::new(None)),
        };
        (scanner, rx)
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn is_scanning(&self) -> bool {
        self.scan.as_ref().is_some_and(|scan| !scan.task.is_finished())
    }

    /// Addresses the discovery request is sent to.
    pub fn targets(&self) -> Vec<Ipv4Addr> {
        if self.config.targets.is_empty() {
            broadcast_targets(self.config.search_mask)
        } else {
            self.config.targets.clone()
        }
    }

    /// Start a scan.
    ///
    /// Returns `true` when a new scan was started. Calling this while a scan
    /// is running logs and returns `false`; so does a bind failure.
    pub fn start(&mut self) -> bool {
        if self.is_scanning() {
            self.events.info("Scan already running, start ignored");
            return false;
        }
        self.scan = None;

        match preferred_local_address() {
            Some(local) => self.events.debug(format!("Local address: {}", local)),
            None => self
                .events
                .warn("No non-loopback IPv4 address found, using limited broadcast"),
        }

        let port = self.config.port;
        let socket = match bind(port, Some(self.config.recv_buffer_size)) {
            Ok(socket) => socket,
            Err(e) => {
                self.events
                    .warn(format!("UDP bind failed on port {}: {}", port, e));
                return false;
            }
        };

        // A second socket on the port would take a share of the replies.
        if lock(&self.command).take().is_some() {
            self.events.debug("Command socket closed, commands use the scan socket");
        }

        let socket = Arc::new(socket);
        let targets = self.targets();
        let listed: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
        self.events.info(format!(
            "Scan start: port={}, mask={}, targets=[{}]",
            port,
            self.config.search_mask,
            listed.join(", ")
        ));

        let task = ScanTask {
            socket: Arc::clone(&socket),
            targets,
            port,
            config: self.config.clone(),
            events: self.events.clone(),
        };
        self.scan = Some(ActiveScan {
            task: tokio::spawn(task.run()),
            socket,
        });
        true
    }

    /// Stop the scan and close the command socket.
    ///
    /// Safe to call at any time; stopping an idle scanner only logs.
    pub fn stop(&mut self) {
        let command = lock(&self.command).take();

        match self.scan.take() {
            Some(scan) if !scan.task.is_finished() => {
                scan.task.abort();
                self.events.info("UDP scan stopped");
            }
            _ => self.events.debug("Stop ignored: no scan running"),
        }

        if command.is_some() {
            self.events.debug("Command socket closed");
        }
    }

    /// Broadcast a reset to the subnet of `device_ip`.
    ///
    /// Malformed input is returned as an error before anything is sent.
    /// `Ok(false)` means the command socket could not be opened; send
    /// failures themselves are only logged.
    pub fn send_reset(&self, device_ip: &str, hw_address: &str) -> Result<bool, FormatError> {
        let packet = encode_reset(hw_address)?;
        let device_ip = parse_ipv4("device IP", device_ip)?;
        let target = broadcast_address(device_ip, self.config.search_mask);

        Ok(self.dispatch(
            "Reset",
            "broadcast",
            packet,
            SocketAddrV4::new(target, self.config.port),
        ))
    }

    /// Send an update-config command directly to the device.
    ///
    /// Same result convention as [`send_reset`](Self::send_reset).
    pub fn send_update_config(&self, request: &UpdateConfigRequest) -> Result<bool, FormatError> {
        let packet = encode_update_config(request)?;
        let device_ip = parse_ipv4("device IP", &request.device_ip)?;

        Ok(self.dispatch(
            "Update config",
            "unicast",
            packet,
            SocketAddrV4::new(device_ip, self.config.port),
        ))
    }

    fn dispatch(&self, label: &'static str, mode: &'static str, packet: Bytes, to: SocketAddrV4) -> bool {
        let socket = match self.command_socket() {
            Ok(socket) => socket,
            Err(e) => {
                self.events.warn(format!(
                    "{} not sent: command socket bind failed on port {}: {}",
                    label, self.config.port, e
                ));
                return false;
            }
        };

        self.events.info(format!(
            "{} TX ({}) -> {} ({} bytes)",
            label,
            mode,
            to,
            packet.len()
        ));
        self.events.debug(hex_dump(&packet));

        let events = self.events.clone();
        let slot = Arc::clone(&self.command);
        tokio::spawn(async move {
            match socket.send_to(&packet, SocketAddr::V4(to)).await {
                Ok(_) => events.info(format!("{} sent -> {}", label, to)),
                Err(e) => {
                    events.warn(format!("{} send failed -> {}: {}", label, to, e));
                    let mut guard = lock(&slot);
                    if guard.as_ref().is_some_and(|s| Arc::ptr_eq(s, &socket)) {
                        *guard = None;
                    }
                }
            }
        });
        true
    }

    fn command_socket(&self) -> std::io::Result<Arc<UdpSocket>> {
        if let Some(scan) = self.scan.as_ref().filter(|scan| !scan.task.is_finished()) {
            return Ok(Arc::clone(&scan.socket));
        }

        let mut slot = lock(&self.command);
        if let Some(socket) = slot.as_ref() {
            return Ok(Arc::clone(socket));
        }

        let socket = Arc::new(bind(self.config.port, None)?);
        self.events
            .debug(format!("Command socket ready on 0.0.0.0:{}", self.config.port));
        *slot = Some(Arc::clone(&socket));
        Ok(socket)
    }
}

impl Drop for DiscoveryScanner {
    fn drop(&mut self) {
        if let Some(scan) = self.scan.take() {
            scan.task.abort();
        }
    }
}

fn lock(slot: &CommandSlot) -> MutexGuard<'_, Option<Arc<UdpSocket>>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn bind(port: u16, recv_buffer_size: Option<usize>) -> std::io::Result<UdpSocket> {
    let std_socket = create_reusable_socket(port, recv_buffer_size)?;
    UdpSocket::from_std(std_socket)
}

struct ScanTask {
    socket: Arc<UdpSocket>,
    targets: Vec<Ipv4Addr>,
    port: u16,
    config: DiscoveryConfig,
    events: Emitter<ScanEvent>,
}

impl ScanTask {
    async fn run(self) {
        let packet = encode_discovery_request();
        let total = self.config.send_count;
        let mut ticker = interval(self.config.resend_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut sent = 0u32;
        let mut buf = vec![0u8; 2048];

        loop {
            tokio::select! {
                _ = ticker.tick(), if sent < total => {
                    sent += 1;
                    if sent > 1 {
                        self.events.info(format!("Resend ({}/{})", sent, total));
                    }
                    self.broadcast(&packet).await;
                }
                result = self.socket.recv_from(&mut buf) => match result {
                    Ok((len, from)) => self.handle_datagram(&buf[..len], from),
                    Err(e) => {
                        self.events.warn(format!("UDP receive error: {}", e));
                        break;
                    }
                },
            }
        }

        self.events.info("UDP scan socket closed");
    }

    async fn broadcast(&self, packet: &[u8]) {
        for target in &self.targets {
            let to = SocketAddrV4::new(*target, self.port);
            match self.socket.send_to(packet, SocketAddr::V4(to)).await {
                Ok(n) => self.events.debug(format!("Discovery TX -> {} ({} bytes)", to, n)),
                Err(e) => self.events.warn(format!("Discovery send failed -> {}: {}", to, e)),
            }
        }
    }

    /// Anything that does not decode is still reported, as a hex dump.
    fn handle_datagram(&self, data: &[u8], from: SocketAddr) {
        let Some(response) = decode_discovery_response(data) else {
            self.events.emit(ScanEvent::Raw(RawDatagram {
                from: from.to_string(),
                size: data.len(),
                hex: hex_dump(data),
            }));
            return;
        };

        let info = response.into_device_info(from, data);
        self.events.info(format!(
            "Device {} at {} (firmware {})",
            info.hw_address, info.device_ip, info.firmware_version
        ));
        self.events.emit(ScanEvent::Device(info));
    }
}
