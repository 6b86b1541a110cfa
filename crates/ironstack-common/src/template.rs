//! ---
//! ironstack_section: "01-core-functionality"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Placeholder expansion with automatic host references."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

/// Template parameters, `NAME -> value`.
pub type Params = IndexMap<String, String>;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\(([A-Za-z0-9_:\-]+)\)").expect("placeholder pattern to compile")
});

const AUTO_PREFIX: &str = "auto:";

/// Replace every `$(NAME)` placeholder in `template`.
///
/// `$(auto:ip)`, `$(auto:hostname)` and `$(auto:home)` resolve from the host.
/// Other names resolve from `params`; unknown names are left untouched.
pub fn expand_template(template: &str, params: &Params) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            let resolved = match name.strip_prefix(AUTO_PREFIX) {
                Some(auto) => auto_reference(auto),
                None => params.get(name).cloned(),
            };
            resolved.unwrap_or_else(|| {
                debug!(placeholder = %name, "leaving unresolved placeholder");
                caps[0].to_owned()
            })
        })
        .into_owned()
}

/// Expand every element of an argument list.
pub fn expand_all(items: &[String], params: &Params) -> Vec<String> {
    items
        .iter()
        .map(|item| expand_template(item, params))
        .collect()
}

fn auto_reference(name: &str) -> Option<String> {
    match name {
        "ip" => Some(host_ip().to_string()),
        "hostname" => nix::unistd::gethostname()
            .ok()
            .and_then(|host| host.into_string().ok()),
        "home" => dirs::home_dir().map(|home| home.display().to_string()),
        _ => None,
    }
}

/// Address of the interface carrying the default route, loopback when offline.
///
/// Connecting a UDP socket sends no packets; it only selects a source address.
pub fn host_ip() -> IpAddr {
    UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|socket| {
            socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
            socket.local_addr()
        })
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
