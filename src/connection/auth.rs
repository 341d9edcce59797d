//! Xauthority lookup
//!
//! Entries in the authority file are big-endian, length-prefixed records:
//! family, address, display number, auth name, auth data.

use super::DisplayTarget;
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{self, Cursor, Read};
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// Only cookie scheme the client speaks
pub const MIT_MAGIC_COOKIE: &str = "MIT-MAGIC-COOKIE-1";

pub const FAMILY_INTERNET: u16 = 0;
pub const FAMILY_LOCAL: u16 = 256;
pub const FAMILY_WILD: u16 = 65535;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEntry {
    pub family: u16,
    pub address: Vec<u8>,
    pub number: String,
    pub name: String,
    pub data: Vec<u8>,
}

fn read_counted(c: &mut Cursor<&[u8]>) -> io::Result<Vec<u8>> {
    let len = c.read_u16::<BigEndian>()? as usize;
    let mut buf = vec![0u8; len];
    c.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_entry(c: &mut Cursor<&[u8]>) -> io::Result<AuthEntry> {
    let family = c.read_u16::<BigEndian>()?;
    let address = read_counted(c)?;
    let number = read_counted(c)?;
    let name = read_counted(c)?;
    let data = read_counted(c)?;
    Ok(AuthEntry {
        family,
        address,
        number: String::from_utf8_lossy(&number).to_string(),
        name: String::from_utf8_lossy(&name).to_string(),
        data,
    })
}

/// Parse every complete entry; a truncated tail is ignored.
pub fn parse_entries(data: &[u8]) -> Vec<AuthEntry> {
    let mut c = Cursor::new(data);
    let mut entries = Vec::new();

    while (c.position() as usize) < data.len() {
        match read_entry(&mut c) {
            Ok(entry) => entries.push(entry),
            Err(_) => break,
        }
    }
    entries
}

/// The host identity an entry must match
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Peer {
    Local(String),
    Internet(Ipv4Addr),
}

impl AuthEntry {
    fn matches(&self, peer: &Peer, display: u16) -> bool {
        if !self.number.is_empty() && self.number != display.to_string() {
            return false;
        }
        if self.name != MIT_MAGIC_COOKIE {
            return false;
        }
        match (self.family, peer) {
            (FAMILY_WILD, _) => true,
            (FAMILY_LOCAL, Peer::Local(hostname)) => self.address == hostname.as_bytes(),
            (FAMILY_INTERNET, Peer::Internet(ip)) => self.address == ip.octets(),
            _ => false,
        }
    }
}

/// First usable cookie for `display` as seen from `peer`
pub fn find_cookie(entries: &[AuthEntry], peer: &Peer, display: u16) -> Option<(String, Vec<u8>)> {
    entries
        .iter()
        .find(|entry| entry.matches(peer, display))
        .map(|entry| (entry.name.clone(), entry.data.clone()))
}

/// `$XAUTHORITY`, or `$HOME/.Xauthority`
pub fn authority_path() -> Option<PathBuf> {
    std::env::var_os("XAUTHORITY")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".Xauthority")))
}

#[cfg(unix)]
fn local_hostname() -> Option<String> {
    nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
}

#[cfg(not(unix))]
fn local_hostname() -> Option<String> {
    std::env::var("COMPUTERNAME").ok()
}

/// Authorization name and data for a connection to `target`.
///
/// Returns empty name and data when nothing suitable is found.
pub fn lookup(target: &DisplayTarget, peer_ip: Option<Ipv4Addr>) -> (String, Vec<u8>) {
    let peer = match peer_ip {
        Some(ip) if !ip.is_loopback() => Peer::Internet(ip),
        _ => Peer::Local(local_hostname().unwrap_or_default()),
    };

    let path = match authority_path() {
        Some(path) => path,
        None => {
            log::debug!("No authority file location known");
            return (String::new(), Vec::new());
        }
    };
    let data = match std::fs::read(&path) {
        Ok(data) => data,
        Err(e) => {
            log::debug!("Could not read {}: {}", path.display(), e);
            return (String::new(), Vec::new());
        }
    };

    match find_cookie(&parse_entries(&data), &peer, target.display) {
        Some((name, data)) => {
            log::debug!("Found auth: {} ({} bytes)", name, data.len());
            (name, data)
        }
        None => {
            log::debug!("No auth entry found for display {}", target.display);
            (String::new(), Vec::new())
        }
    }
}
