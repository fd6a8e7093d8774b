//! SASL authentication: mechanism choice plus the PLAIN and DIGEST-MD5
//! client sides.
//!
//! DIGEST-MD5 follows RFC 2831 with one deliberate shortcut shared with
//! many servers: the final `rspauth` challenge is not validated, the
//! client reads `<success/>` or `<failure/>` directly after its single
//! `<response/>`.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use md5::{Digest, Md5};
use rand::{rngs::OsRng, Rng};

use crate::error::{AuthError, Error};

/// SASL mechanisms this client can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mechanism {
    /// RFC 2831 digest authentication
    DigestMd5,
    /// RFC 4616 plaintext authentication
    Plain,
}

impl Mechanism {
    /// The mechanism name as advertised in `<mechanisms/>`.
    pub fn name(self) -> &'static str {
        match self {
            Mechanism::DigestMd5 => "DIGEST-MD5",
            Mechanism::Plain => "PLAIN",
        }
    }
}

/// Pick a mechanism from the advertised list in a single pass: DIGEST-MD5
/// wins immediately, PLAIN is remembered as the fallback offer. There is
/// no second pass; a DIGEST-MD5 failure is final.
pub fn select_mechanism(offered: &[String]) -> Result<Mechanism, Error> {
    let mut have_plain = false;
    for mechanism in offered {
        match mechanism.as_str() {
            "DIGEST-MD5" => return Ok(Mechanism::DigestMd5),
            "PLAIN" => have_plain = true,
            _ => {}
        }
    }
    if have_plain {
        Ok(Mechanism::Plain)
    } else {
        Err(AuthError::Unsupported(offered.to_vec()).into())
    }
}

/// Base64 initial response for PLAIN: `\0user\0password`.
pub fn plain_initial(username: &str, password: &str) -> String {
    BASE64.encode(format!("\0{}\0{}", username, password))
}

/// Answer a DIGEST-MD5 challenge. Takes the base64 challenge payload and
/// returns the base64 response payload.
pub fn digest_md5_reply(
    challenge_b64: &str,
    username: &str,
    password: &str,
    domain: &str,
) -> Result<String, Error> {
    let decoded = BASE64
        .decode(challenge_b64.trim().as_bytes())
        .map_err(|_| AuthError::BadChallenge)?;
    let challenge = String::from_utf8(decoded).map_err(|_| AuthError::BadChallenge)?;
    let directives = parse_directives(&challenge);

    // Missing directives degrade to the empty string, as the original
    // client behaves; servers always send nonce and qop in practice.
    let empty = String::new();
    let realm = directives.get("realm").unwrap_or(&empty);
    let nonce = directives.get("nonce").unwrap_or(&empty);
    let qop = directives.get("qop").unwrap_or(&empty);
    let charset = directives.get("charset").unwrap_or(&empty);

    let cnonce = cnonce();
    let digest_uri = format!("xmpp/{}", domain);
    let nonce_count = format!("{:08x}", 1);
    let response = md5_digest_response(
        username,
        realm,
        password,
        nonce,
        &cnonce,
        "AUTHENTICATE",
        &digest_uri,
        &nonce_count,
    );

    let message = format!(
        "username=\"{}\", realm=\"{}\", nonce=\"{}\", cnonce=\"{}\", nc={}, qop={}, digest-uri=\"{}\", response={}, charset={}",
        username, realm, nonce, cnonce, nonce_count, qop, digest_uri, response, charset
    );
    Ok(BASE64.encode(message))
}

/// The RFC 2831 response hash.
///
/// A1 is the *raw* 16-byte MD5 of `user:realm:password` with the textual
/// `:nonce:cnonce` tail appended, not its hex form.
pub fn md5_digest_response(
    username: &str,
    realm: &str,
    password: &str,
    nonce: &str,
    cnonce: &str,
    authenticate: &str,
    digest_uri: &str,
    nonce_count: &str,
) -> String {
    let mut a1 = md5_raw(format!("{}:{}:{}", username, realm, password).as_bytes()).to_vec();
    a1.extend_from_slice(format!(":{}:{}", nonce, cnonce).as_bytes());
    let a2 = format!("{}:{}", authenticate, digest_uri);

    let kd = format!(
        "{}:{}:{}:{}:auth:{}",
        hex(&md5_raw(&a1)),
        nonce,
        nonce_count,
        cnonce,
        hex(&md5_raw(a2.as_bytes())),
    );
    hex(&md5_raw(kd.as_bytes()))
}

/// 16 hex digits sampled from a cryptographically strong 64-bit source.
fn cnonce() -> String {
    let value: u64 = OsRng.gen();
    format!("{:016x}", value)
}

/// Split a challenge into `key=value` directives. Values may be wrapped in
/// double quotes; keys without `=` are dropped.
fn parse_directives(challenge: &str) -> HashMap<String, String> {
    let mut directives = HashMap::new();
    for token in challenge.split(',') {
        if let Some((key, value)) = token.trim().split_once('=') {
            let value = value.strip_prefix('"').unwrap_or(value);
            let value = value.strip_suffix('"').unwrap_or(value);
            directives.insert(key.to_owned(), value.to_owned());
        }
    }
    directives
}

fn md5_raw(data: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_response_matches_rfc_2831_example() {
        let response = md5_digest_response(
            "chris",
            "elwood.innosoft.com",
            "secret",
            "OA6MG9tEQGm2hh",
            "OA6MHXh6VqTrRk",
            "AUTHENTICATE",
            "imap/elwood.innosoft.com",
            "00000001",
        );
        assert_eq!(response, "d388dad90d4bbd760a152321f2143af7");
    }

    #[test]
    fn plain_initial_is_nul_separated() {
        assert_eq!(plain_initial("user", "pass"), "AHVzZXIAcGFzcw==");
    }

    #[test]
    fn digest_md5_wins_over_plain_regardless_of_order() {
        let offered = vec!["PLAIN".to_owned(), "DIGEST-MD5".to_owned()];
        assert_eq!(select_mechanism(&offered).unwrap(), Mechanism::DigestMd5);
        let offered = vec!["DIGEST-MD5".to_owned(), "PLAIN".to_owned()];
        assert_eq!(select_mechanism(&offered).unwrap(), Mechanism::DigestMd5);
    }

    #[test]
    fn plain_is_the_fallback_offer() {
        let offered = vec!["SCRAM-SHA-1".to_owned(), "PLAIN".to_owned()];
        assert_eq!(select_mechanism(&offered).unwrap(), Mechanism::Plain);
    }

    #[test]
    fn no_known_mechanism_is_unsupported() {
        let offered = vec!["SCRAM-SHA-1".to_owned(), "EXTERNAL".to_owned()];
        match select_mechanism(&offered) {
            Err(Error::Auth(AuthError::Unsupported(list))) => assert_eq!(list, offered),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn directives_strip_quotes_and_whitespace() {
        let directives = parse_directives(
            "realm=\"elwood.innosoft.com\", nonce=\"OA6MG9tEQGm2hh\", qop=\"auth\", \
             algorithm=md5-sess, charset=utf-8",
        );
        assert_eq!(directives["realm"], "elwood.innosoft.com");
        assert_eq!(directives["nonce"], "OA6MG9tEQGm2hh");
        assert_eq!(directives["qop"], "auth");
        assert_eq!(directives["algorithm"], "md5-sess");
        assert_eq!(directives["charset"], "utf-8");
    }

    #[test]
    fn challenge_reply_round_trip() {
        let challenge = BASE64.encode(
            "realm=\"example.com\", nonce=\"abc123\", qop=\"auth\", charset=utf-8, algorithm=md5-sess",
        );
        let reply = digest_md5_reply(&challenge, "romeo", "s3cr3t", "example.com").unwrap();
        let decoded = String::from_utf8(BASE64.decode(reply).unwrap()).unwrap();
        assert!(decoded.contains("username=\"romeo\""));
        assert!(decoded.contains("realm=\"example.com\""));
        assert!(decoded.contains("digest-uri=\"xmpp/example.com\""));
        assert!(decoded.contains("nc=00000001"));
        assert!(decoded.contains("qop=auth"));
        assert!(decoded.contains("charset=utf-8"));
        let response = decoded
            .split(", ")
            .find_map(|d| d.strip_prefix("response="))
            .unwrap();
        assert_eq!(response.len(), 32);
        assert!(response.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn cnonce_is_sixteen_hex_digits() {
        let value = cnonce();
        assert_eq!(value.len(), 16);
        assert!(value.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn garbage_challenge_is_rejected() {
        assert!(matches!(
            digest_md5_reply("!!!not-base64!!!", "a", "b", "c"),
            Err(Error::Auth(AuthError::BadChallenge))
        ));
    }
}
