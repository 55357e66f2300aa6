//! Visitor details taken from HTTP request headers
//!
//! Headers set by Cloudflare (`CF-Connecting-IP`, `CF-IPCountry`) are
//! preferred; otherwise the nearest `X-Forwarded-For` hop or the socket
//! address is used.

use anyhow::anyhow;
use axum::http::{header, HeaderMap};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::net::IpAddr;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Extract the client IP address, falling back to the socket address
pub fn extract_client_ip(headers: &HeaderMap, socket_ip: Option<IpAddr>) -> Option<IpAddr> {
    if let Some(ip) = header_str(headers, "cf-connecting-ip").and_then(|s| s.parse().ok()) {
        return Some(ip);
    }

    // Rightmost entry is the one appended by the proxy closest to us
    let forwarded = header_str(headers, "x-forwarded-for").and_then(|xff| {
        xff.split(',')
            .filter_map(|s| s.trim().parse::<IpAddr>().ok())
            .next_back()
    });

    forwarded.or(socket_ip)
}

/// Two-letter country code from `CF-IPCountry`; unknown and Tor markers are dropped
pub fn extract_country(headers: &HeaderMap) -> Option<String> {
    header_str(headers, "cf-ipcountry")
        .filter(|code| code.len() == 2 && !matches!(*code, "XX" | "T1"))
        .map(|code| code.to_ascii_uppercase())
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    header_str(headers, header::USER_AGENT.as_str()).map(str::to_string)
}

pub fn extract_referrer(headers: &HeaderMap) -> Option<String> {
    header_str(headers, header::REFERER.as_str()).map(str::to_string)
}

/// Keyed hash of client addresses, so raw IPs never reach the sink
#[derive(Clone)]
pub struct IpHasher {
    mac: Hmac<Sha256>,
}

impl IpHasher {
    /// Without a secret a random key is generated (hashes won't match across restarts)
    pub fn new(secret: Option<&str>) -> anyhow::Result<Self> {
        let key: Vec<u8> = match secret.filter(|s| !s.is_empty()) {
            Some(s) => s.as_bytes().to_vec(),
            None => {
                tracing::warn!(
                    "no analytics ip_hash_secret configured, visitor hashes won't survive restarts"
                );
                (0..32).map(|_| rand::random::<u8>()).collect()
            }
        };
        let mac = Hmac::<Sha256>::new_from_slice(&key)
            .map_err(|e| anyhow!("Failed to create HMAC: {}", e))?;
        Ok(Self { mac })
    }

    /// Hex HMAC-SHA256 of the textual address
    pub fn hash(&self, ip: IpAddr) -> String {
        let mut mac = self.mac.clone();
        mac.update(ip.to_string().as_bytes());
        mac.finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}
