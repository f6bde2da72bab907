//! Broadcast discovery of BJNP printers on local subnets.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::os::fd::AsRawFd;
use std::thread;
use std::time::Duration;

use bjnp_frame::code::PORT_PRINT;
use bjnp_frame::{decode, encode, hexdump, Command, DeviceIdentity, MacAddress, Response};
use bjnp_transport::{
    broadcast_socket, interfaces, wait_readiness, Interest, Interface, PollEntry, MAX_DATAGRAM,
};
use tracing::{debug, info, trace, warn};

use crate::commands::{get_identity, ExchangeConfig};
use crate::error::Result;
use crate::printer::{resolve_host, AddressRank, DiscoveredPrinter};
use crate::sequence::Sequencer;

/// Configuration for a discovery run.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Port printers listen on.
    pub port: u16,
    /// Quiet period that ends collection of responses.
    pub window: Duration,
    /// Discover frames sent per interface.
    pub broadcast_attempts: u32,
    /// Pause between those frames.
    pub broadcast_interval: Duration,
    /// Policy for the identity exchange with each printer found.
    pub exchange: ExchangeConfig,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: PORT_PRINT,
            window: Duration::from_secs(1),
            broadcast_attempts: 2,
            broadcast_interval: Duration::from_millis(10),
            exchange: ExchangeConfig::default(),
        }
    }
}

/// Where to broadcast from and to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BroadcastTarget {
    local: SocketAddr,
    broadcast: SocketAddr,
}

/// Finds printers by broadcasting a Discover command on every interface.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    config: DiscoveryConfig,
}

/// A printer reachable at one candidate address, before its identity is known.
struct Candidate {
    addr: IpAddr,
    hostname: String,
    rank: AddressRank,
}

impl Discovery {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Discover printers on all local interfaces.
    pub fn discover_all(&self) -> Result<Vec<DiscoveredPrinter>> {
        let interfaces = interfaces()?;
        Ok(self.discover(&interfaces))
    }

    /// Discover printers reachable through `interfaces`.
    ///
    /// Never fails: unusable interfaces and malformed replies are logged and
    /// skipped, and silence yields an empty list.
    pub fn discover(&self, interfaces: &[Interface]) -> Vec<DiscoveredPrinter> {
        let targets = self.targets(interfaces);
        let mut sequencer = Sequencer::new();
        let sockets = self.broadcast(&targets, &mut sequencer);
        if sockets.is_empty() {
            warn!("no usable interface for discovery");
            return Vec::new();
        }

        let replies = self.collect(&sockets);
        let mut found: BTreeMap<MacAddress, Candidate> = BTreeMap::new();
        for (mac, addresses) in replies {
            let Some(best) = addresses
                .into_iter()
                .map(|addr| {
                    let (hostname, rank) = resolve_host(addr);
                    Candidate {
                        addr,
                        hostname,
                        rank,
                    }
                })
                .reduce(|best, next| if next.rank > best.rank { next } else { best })
            else {
                continue;
            };
            match found.get(&mac) {
                Some(existing) if existing.rank >= best.rank => {}
                _ => {
                    found.insert(mac, best);
                }
            }
        }

        found
            .into_iter()
            .map(|(mac, candidate)| self.identify(mac, candidate, &mut sequencer))
            .collect()
    }

    fn targets(&self, interfaces: &[Interface]) -> Vec<BroadcastTarget> {
        let mut targets: Vec<BroadcastTarget> = interfaces
            .iter()
            .filter(|iface| iface.can_broadcast())
            .filter_map(|iface| {
                let broadcast = iface.broadcast?;
                debug!(interface = %iface.name, %broadcast, "discovery target");
                Some(BroadcastTarget {
                    local: SocketAddr::new(IpAddr::V4(iface.address), 0),
                    broadcast: SocketAddr::new(IpAddr::V4(broadcast), self.config.port),
                })
            })
            .collect();

        if targets.is_empty() {
            debug!("no broadcast interfaces, using global broadcast");
            targets.push(BroadcastTarget {
                local: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
                broadcast: SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), self.config.port),
            });
        }
        targets
    }

    fn broadcast(&self, targets: &[BroadcastTarget], sequencer: &mut Sequencer) -> Vec<UdpSocket> {
        let mut sockets = Vec::with_capacity(targets.len());
        for target in targets {
            let socket = match broadcast_socket(target.local) {
                Ok(socket) => socket,
                Err(e) => {
                    warn!(local = %target.local, error = %e, "skipping interface");
                    continue;
                }
            };

            let mut sent_any = false;
            for attempt in 0..self.config.broadcast_attempts.max(1) {
                if attempt > 0 {
                    thread::sleep(self.config.broadcast_interval);
                }
                let frame = match encode(&Command::Discover, 0, sequencer.issue()) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(error = %e, "failed to encode discover command");
                        break;
                    }
                };
                match socket.send_to(&frame, target.broadcast) {
                    Ok(_) => sent_any = true,
                    Err(e) => {
                        debug!(broadcast = %target.broadcast, error = %e, "discover send failed")
                    }
                }
            }

            if sent_any {
                sockets.push(socket);
            } else {
                warn!(broadcast = %target.broadcast, "could not broadcast discover command");
            }
        }
        sockets
    }

    /// Gather discover replies until one full window passes without any.
    fn collect(&self, sockets: &[UdpSocket]) -> Vec<(MacAddress, Vec<IpAddr>)> {
        let mut entries: Vec<PollEntry> = sockets
            .iter()
            .map(|s| PollEntry::new(s.as_raw_fd(), Interest::READ))
            .collect();
        let mut replies = Vec::new();
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            match wait_readiness(&mut entries, Some(self.config.window)) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, "discovery wait failed");
                    break;
                }
            }

            for (entry, socket) in entries.iter().zip(sockets) {
                if !entry.readable() {
                    continue;
                }
                let (n, from) = match socket.recv_from(&mut buf) {
                    Ok(received) => received,
                    Err(e) => {
                        debug!(error = %e, "discovery receive failed");
                        continue;
                    }
                };
                trace!(%from, "discover reply\n{}", hexdump(&buf[..n]));
                match decode(&buf[..n]) {
                    Ok(frame) => match frame.response {
                        Response::Discover(reply) => {
                            info!(%from, mac = %reply.mac, "printer answered discovery");
                            replies.push((reply.mac, reply.addresses));
                        }
                        other => {
                            debug!(%from, code = other.code(), "ignoring non-discover reply")
                        }
                    },
                    Err(e) => warn!(%from, error = %e, "malformed discover reply"),
                }
            }
        }
        replies
    }

    fn identify(
        &self,
        mac: MacAddress,
        candidate: Candidate,
        sequencer: &mut Sequencer,
    ) -> DiscoveredPrinter {
        let addr = SocketAddr::new(candidate.addr, self.config.port);
        let identity = match get_identity(addr, 0, sequencer.issue(), &self.config.exchange) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(%addr, error = %e, "could not read printer identity");
                DeviceIdentity::unidentified()
            }
        };
        info!(
            %addr,
            hostname = %candidate.hostname,
            model = %identity.model,
            "discovered printer"
        );
        DiscoveredPrinter {
            addr: candidate.addr,
            port: self.config.port,
            hostname: candidate.hostname,
            rank: candidate.rank,
            mac: Some(mac),
            identity,
        }
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use crate::testing::FakePrinter;

    fn loopback_interface(name: &str, broadcast: [u8; 4]) -> Interface {
        Interface {
            name: name.to_string(),
            address: Ipv4Addr::LOCALHOST,
            broadcast: Some(Ipv4Addr::from(broadcast)),
            loopback: false,
        }
    }

    fn quick(port: u16) -> DiscoveryConfig {
        DiscoveryConfig {
            port,
            window: Duration::from_millis(300),
            broadcast_attempts: 2,
            broadcast_interval: Duration::from_millis(10),
            exchange: ExchangeConfig {
                timeout: Duration::from_millis(500),
                max_tries: 2,
            },
        }
    }

    #[test]
    fn finds_responding_printers_and_skips_silent_subnet() {
        let first = FakePrinter::with_mac(
            "127.0.0.2".parse().unwrap(),
            0,
            MacAddress([0, 0x1e, 0x8f, 0, 0, 2]),
        );
        let port = first.addr().port();
        let second = FakePrinter::with_mac(
            "127.0.0.3".parse().unwrap(),
            port,
            MacAddress([0, 0x1e, 0x8f, 0, 0, 3]),
        );

        let interfaces = [
            loopback_interface("fake0", [127, 0, 0, 2]),
            loopback_interface("fake1", [127, 0, 0, 3]),
            loopback_interface("dead0", [127, 0, 0, 4]),
        ];
        let printers = Discovery::new(quick(port)).discover(&interfaces);

        // Two broadcasts each, one entry per device.
        assert_eq!(first.discover_count(), 2);
        assert_eq!(second.discover_count(), 2);
        assert_eq!(printers.len(), 2);

        let addrs: Vec<IpAddr> = printers.iter().map(|p| p.addr).collect();
        assert!(addrs.contains(&"127.0.0.2".parse().unwrap()));
        assert!(addrs.contains(&"127.0.0.3".parse().unwrap()));
        for printer in &printers {
            assert_eq!(printer.port, port);
            assert_eq!(printer.model(), "Canon PIXMA Test");
            assert!(printer.mac.is_some());
        }
    }

    #[test]
    fn same_device_on_two_subnets_is_reported_once() {
        let mac = MacAddress([0, 0x1e, 0x8f, 0xaa, 0xbb, 0xcc]);
        let first = FakePrinter::with_mac("127.0.0.5".parse().unwrap(), 0, mac);
        let port = first.addr().port();
        let _second = FakePrinter::with_mac("127.0.0.6".parse().unwrap(), port, mac);

        let interfaces = [
            loopback_interface("fake0", [127, 0, 0, 5]),
            loopback_interface("fake1", [127, 0, 0, 6]),
        ];
        let printers = Discovery::new(quick(port)).discover(&interfaces);
        assert_eq!(printers.len(), 1);
        assert_eq!(printers[0].mac, Some(mac));
    }

    #[test]
    fn silence_yields_empty_list() {
        let interfaces = [loopback_interface("dead0", [127, 0, 0, 7])];
        let printers = Discovery::new(quick(9)).discover(&interfaces);
        assert!(printers.is_empty());
    }

    #[test]
    fn loopback_only_falls_back_to_global_broadcast() {
        let discovery = Discovery::new(quick(8611));
        let targets = discovery.targets(&[Interface {
            name: "lo".into(),
            address: Ipv4Addr::LOCALHOST,
            broadcast: None,
            loopback: true,
        }]);
        assert_eq!(
            targets,
            vec![BroadcastTarget {
                local: "0.0.0.0:0".parse().unwrap(),
                broadcast: "255.255.255.255:8611".parse().unwrap(),
            }]
        );
    }
}
