//! Helpers for `localpart@domainpart[/resource]` Jabber identifiers.
//!
//! These operate on JIDs as plain strings; no stringprep is applied.

use crate::Error;

/// Strip the resource, if any: `a@b/c` becomes `a@b`.
pub fn bare_jid(jid: &str) -> &str {
    match jid.find('/') {
        Some(i) => &jid[..i],
        None => jid,
    }
}

/// Extract the domainpart. Errors if the JID carries no `@` or the
/// domainpart is empty.
pub fn domainpart(jid: &str) -> Result<&str, Error> {
    let (_, domain) = parts(jid)?;
    Ok(domain)
}

/// Split a bare or full JID into (localpart, domainpart).
pub fn parts(jid: &str) -> Result<(&str, &str), Error> {
    let jid = jid.trim();
    match bare_jid(jid).split_once('@') {
        Some((local, domain)) if !domain.is_empty() => Ok((local, domain)),
        _ => Err(Error::InvalidJid(jid.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_strips_resource() {
        assert_eq!(bare_jid("romeo@example.net/balcony"), "romeo@example.net");
        assert_eq!(bare_jid("romeo@example.net"), "romeo@example.net");
    }

    #[test]
    fn domain_of_full_jid() {
        assert_eq!(domainpart("romeo@example.net/balcony").unwrap(), "example.net");
        assert_eq!(domainpart("romeo@example.net").unwrap(), "example.net");
    }

    #[test]
    fn missing_at_is_invalid() {
        assert!(matches!(domainpart("example.net"), Err(Error::InvalidJid(_))));
        assert!(matches!(domainpart("romeo@"), Err(Error::InvalidJid(_))));
    }

    #[test]
    fn parts_split() {
        let (local, domain) = parts("juliet@capulet.com/chamber").unwrap();
        assert_eq!(local, "juliet");
        assert_eq!(domain, "capulet.com");
    }
}
