//! [apps/control-plane/src/services/access_control.rs]
//! Per-port network allowlist. Pure function of (remote
//! address, target port) — no state, no I/O, easy to unit-test exhaustively.

use std::net::{IpAddr, Ipv4Addr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Lan,
    Tailscale,
    Localhost,
    Blocked,
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, AccessDecision::Blocked)
    }
}

pub struct AccessControl {
    api_port: u16,
    llm_backend_port: u16,
    blocklist: Vec<IpAddr>,
}

impl AccessControl {
    pub fn new(api_port: u16, llm_backend_port: u16, blocklist: Vec<IpAddr>) -> Self {
        Self { api_port, llm_backend_port, blocklist }
    }

    fn is_localhost(addr: IpAddr) -> bool {
        addr.is_loopback()
    }

    /// RFC1918: 10/8, 172.16/12, 192.168/16.
    fn is_lan(addr: IpAddr) -> bool {
        match addr {
            IpAddr::V4(v4) => {
                let octets = v4.octets();
                octets[0] == 10
                    || (octets[0] == 172 && (16..=31).contains(&octets[1]))
                    || (octets[0] == 192 && octets[1] == 168)
            }
            IpAddr::V6(_) => false,
        }
    }

    /// Tailscale's CGNAT range, 100.64.0.0/10.
    fn is_tailscale(addr: IpAddr) -> bool {
        match addr {
            IpAddr::V4(v4) => {
                let octets = v4.octets();
                octets[0] == 100 && (64..=127).contains(&octets[1])
            }
            IpAddr::V6(_) => false,
        }
    }

    /// `evaluate(remote_addr, port)`: explicit blocks take precedence
    /// over every allowance; the LLM backend port only ever accepts
    /// localhost.
    pub fn evaluate(&self, remote_addr: IpAddr, port: u16) -> AccessDecision {
        if self.blocklist.contains(&remote_addr) {
            return AccessDecision::Blocked;
        }

        if port == self.llm_backend_port {
            return if Self::is_localhost(remote_addr) { AccessDecision::Localhost } else { AccessDecision::Blocked };
        }

        if port == self.api_port {
            if Self::is_localhost(remote_addr) {
                return AccessDecision::Localhost;
            }
            if Self::is_tailscale(remote_addr) {
                return AccessDecision::Tailscale;
            }
            if Self::is_lan(remote_addr) {
                return AccessDecision::Lan;
            }
        }

        AccessDecision::Blocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(a, b, c, d))
    }

    #[test]
    fn lan_range_is_allowed_on_the_api_port() {
        let ac = AccessControl::new(8420, 8421, Vec::new());
        assert_eq!(ac.evaluate(v4(192, 168, 1, 50), 8420), AccessDecision::Lan);
    }

    #[test]
    fn tailscale_range_is_allowed_on_the_api_port() {
        let ac = AccessControl::new(8420, 8421, Vec::new());
        assert_eq!(ac.evaluate(v4(100, 90, 1, 2), 8420), AccessDecision::Tailscale);
    }

    #[test]
    fn llm_backend_port_rejects_non_localhost() {
        let ac = AccessControl::new(8420, 8421, Vec::new());
        assert_eq!(ac.evaluate(v4(127, 0, 0, 1), 8421), AccessDecision::Localhost);
        assert_eq!(ac.evaluate(v4(192, 168, 1, 50), 8421), AccessDecision::Blocked);
    }

    #[test]
    fn an_explicit_block_wins_even_from_localhost() {
        let blocked = v4(127, 0, 0, 1);
        let ac = AccessControl::new(8420, 8421, vec![blocked]);
        assert_eq!(ac.evaluate(blocked, 8420), AccessDecision::Blocked);
    }

    #[test]
    fn public_internet_addresses_are_blocked() {
        let ac = AccessControl::new(8420, 8421, Vec::new());
        assert_eq!(ac.evaluate(v4(8, 8, 8, 8), 8420), AccessDecision::Blocked);
    }
}
