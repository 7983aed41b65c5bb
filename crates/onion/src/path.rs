//! Turning a chosen path of servers into the per-hop material
//! [`crate::header`] needs to build a header: each hop's packet key and
//! the routing info that points to the *next* hop (or, for the last
//! hop, the exit routing info the caller already built).

use duskrelay_core::constants::{HEADER_LEN, MIN_SUBHEADER_LEN, OAEP_OVERHEAD};
use duskrelay_core::{RoutingInfo, ServerInfo};
use rsa::RsaPublicKey;

use crate::error::{OnionError, Result};

pub struct HeaderHop {
    pub packet_key: RsaPublicKey,
    pub routing: RoutingInfo,
}

impl HeaderHop {
    /// Bytes of header space this hop will consume, per spec's
    /// `len(ri) + OAEP_OVERHEAD + MIN_SUBHEADER_LEN` accounting.
    pub fn header_space(&self) -> usize {
        self.routing.info.len() + OAEP_OVERHEAD + MIN_SUBHEADER_LEN
    }
}

fn packet_key_of(server: &dyn ServerInfo) -> Result<RsaPublicKey> {
    let spki = server.packet_key_der();
    RsaPublicKey::try_from(
        rsa::pkcs8::DecodePublicKey::from_public_key_der(spki)
            .map_err(|_| OnionError::MalformedPayload("server packet key is not valid SPKI DER"))?,
    )
    .map_err(|_: rsa::Error| OnionError::MalformedPayload("server packet key is not a valid RSA key"))
}

/// Build the per-hop list [`build_header`](crate::header::build_header)
/// needs for a path of servers ending in `exit_routing` (an Exit
/// routing info already built by the caller, or a relay routing info
/// for a two-leg path's non-final leg). `swap_at` names the index
/// (relative to this leg) whose routing info to the next hop should
/// carry the "swap" flag, marking the path-1/path-2 crossover.
pub fn hops_for_path(
    servers: &[&dyn ServerInfo],
    exit_routing: RoutingInfo,
    swap_at: Option<usize>,
) -> Result<Vec<HeaderHop>> {
    if servers.is_empty() {
        return Err(OnionError::EmptyPath);
    }
    let mut hops = Vec::with_capacity(servers.len());
    for (i, server) in servers.iter().enumerate() {
        let packet_key = packet_key_of(*server)?;
        let routing = if i + 1 < servers.len() {
            servers[i + 1].routing_info(swap_at == Some(i))
        } else {
            exit_routing.clone()
        };
        hops.push(HeaderHop { packet_key, routing });
    }
    Ok(hops)
}

/// Does this leg's routing info fit in one header? This is the same
/// `sum(header_space()) <= HEADER_LEN` check header construction
/// itself relies on (junk never consumes header space of its own; it
/// only fills in bytes a relay already budgeted for), so failing here
/// means construction would fail too, and we'd rather reject before
/// doing any crypto.
pub fn check_path_length(leg: &'static str, hops: &[HeaderHop]) -> Result<()> {
    if hops.is_empty() {
        return Err(OnionError::EmptyPath);
    }
    let total: usize = hops.iter().map(|h| h.header_space()).sum();
    if total > HEADER_LEN {
        return Err(OnionError::PathTooLong { leg });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use duskrelay_core::constants::DIGEST_LEN;

    fn fake_hop(ri_len: usize) -> HeaderHop {
        use rand::rngs::OsRng;
        let sk = rsa::RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        HeaderHop {
            packet_key: RsaPublicKey::from(&sk),
            routing: RoutingInfo { rt: 1, info: vec![0u8; ri_len] },
        }
    }

    #[test]
    fn empty_path_rejected() {
        assert!(matches!(check_path_length("first", &[]), Err(OnionError::EmptyPath)));
    }

    #[test]
    fn short_path_fits() {
        let hops = vec![fake_hop(10), fake_hop(10)];
        assert!(check_path_length("first", &hops).is_ok());
    }

    #[test]
    fn absurdly_long_path_rejected() {
        let hops: Vec<_> = (0..50).map(|_| fake_hop(100)).collect();
        assert!(matches!(check_path_length("first", &hops), Err(OnionError::PathTooLong { leg: "first" })));
    }

    #[test]
    fn header_space_matches_formula() {
        let h = fake_hop(DIGEST_LEN);
        assert_eq!(h.header_space(), DIGEST_LEN + OAEP_OVERHEAD + MIN_SUBHEADER_LEN);
    }
}
