//! Candidate discovery (spec §6, scenario 6): resolves the set of host
//! candidates advertised in an SDP answer from a config snapshot plus the
//! local network interface list.

use std::net::IpAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpFamily {
    V4,
    V6,
    All,
}

impl IpFamily {
    fn accepts(self, ip: IpAddr) -> bool {
        match self {
            IpFamily::V4 => ip.is_ipv4(),
            IpFamily::V6 => ip.is_ipv6(),
            IpFamily::All => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NetworkInterface {
    pub name: String,
    pub ip: IpAddr,
}

fn is_loopback(ip: IpAddr) -> bool {
    ip.is_loopback() || ip.is_unspecified()
}

#[derive(Debug, Clone)]
pub struct CandidateConfig {
    /// Raw `rtc_server_candidates` value; `"*"` triggers interface
    /// auto-detection when `auto_detect` is also set.
    pub candidates: String,
    pub auto_detect: bool,
    pub family: IpFamily,
    /// User-supplied external IP, always added verbatim.
    pub eip: Option<String>,
    pub api_as_candidates: bool,
    pub keep_api_domain: bool,
    pub resolve_api_domain: bool,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        CandidateConfig {
            candidates: "*".into(),
            auto_detect: true,
            family: IpFamily::All,
            eip: None,
            api_as_candidates: false,
            keep_api_domain: false,
            resolve_api_domain: false,
        }
    }
}

/// The API server's own address, carried separately from the interface list
/// so domain-vs-resolved-IP handling can apply the right gating flags.
pub struct ApiServerAddress {
    pub domain: Option<String>,
    pub resolved_ips: Vec<IpAddr>,
}

/// Resolves the advertised candidate set (spec §6, §8 scenario 6).
pub fn discover_candidates(config: &CandidateConfig, interfaces: &[NetworkInterface], api: Option<&ApiServerAddress>) -> Vec<String> {
    let mut out = Vec::new();

    if config.candidates == "*" && config.auto_detect {
        for iface in interfaces {
            if is_loopback(iface.ip) {
                continue;
            }
            if config.family.accepts(iface.ip) {
                out.push(iface.ip.to_string());
            }
        }
    } else if !config.candidates.is_empty() && config.candidates != "*" {
        out.push(config.candidates.clone());
    }

    if let Some(eip) = &config.eip {
        out.push(eip.clone());
    }

    if config.api_as_candidates {
        if let Some(api) = api {
            if let Some(domain) = &api.domain {
                if config.keep_api_domain || config.resolve_api_domain {
                    out.push(domain.clone());
                }
            }
            if config.resolve_api_domain {
                for ip in &api.resolved_ips {
                    if !is_loopback(*ip) {
                        out.push(ip.to_string());
                    }
                }
            }
        }
    }

    out
}
