//! SRV discovery of the XMPP host for a domain.

use hickory_resolver::{IntoName, TokioAsyncResolver};
use log::debug;
use std::net::IpAddr;

use crate::Error;

/// Look up `_xmpp-client._tcp.<domain>` and return the first SRV record's
/// (target, port). Falls back to `(domain, 5222)` when the lookup fails or
/// returns nothing; IP literals skip the lookup entirely.
pub async fn resolve(domain: &str) -> Result<(String, u16), Error> {
    let ascii_domain = idna::domain_to_ascii(domain)?;

    if ascii_domain.parse::<IpAddr>().is_ok() {
        return Ok((ascii_domain, 5222));
    }

    let resolver = TokioAsyncResolver::tokio_from_system_conf()?;
    let srv_domain = format!("_xmpp-client._tcp.{}.", ascii_domain).into_name()?;
    let srv_records = resolver.srv_lookup(srv_domain.clone()).await.ok();

    let record = srv_records.as_ref().and_then(|lookup| lookup.iter().next());
    match record {
        Some(srv) => {
            let target = srv.target().to_ascii();
            let target = target.trim_end_matches('.').to_owned();
            debug!("SRV {} -> {}:{}", srv_domain, target, srv.port());
            Ok((target, srv.port()))
        }
        None => {
            // SRV lookup error or empty answer, retry with the hostname
            debug!("no SRV record for {}, falling back to {}:5222", srv_domain, domain);
            Ok((domain.to_owned(), 5222))
        }
    }
}
