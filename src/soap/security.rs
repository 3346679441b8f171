use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use quick_xml::escape::escape;
use rand::RngCore;
use sha1::{Digest, Sha1};

const NS_WSSE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
const NS_WSU: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
const PASSWORD_DIGEST: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest";
const NONCE_ENCODING: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";

/// WS-Security UsernameToken carrying a password digest.
///
/// `PasswordDigest = Base64(SHA1(nonce + created + password))`, the nonce
/// being the raw bytes before Base64 encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsernameToken {
    username: String,
    digest: String,
    nonce: String,
    created: String,
}

impl UsernameToken {
    /// Token with a fresh 16 byte nonce, created now.
    pub fn new(username: &str, password: &str) -> Self {
        let mut nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);
        let created = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();

        Self::with_nonce(username, password, &nonce, &created)
    }

    pub fn with_nonce(username: &str, password: &str, nonce: &[u8], created: &str) -> Self {
        let mut sha = Sha1::new();
        sha.update(nonce);
        sha.update(created.as_bytes());
        sha.update(password.as_bytes());

        UsernameToken {
            username: username.to_string(),
            digest: BASE64.encode(sha.finalize()),
            nonce: BASE64.encode(nonce),
            created: created.to_string(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password_digest(&self) -> &str {
        &self.digest
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn created(&self) -> &str {
        &self.created
    }

    /// The `Security` header element, namespaces declared locally so it can be
    /// dropped into any envelope whose SOAP prefix is `s`.
    pub fn to_xml(&self) -> String {
        format!(
            r#"<wsse:Security s:mustUnderstand="1" xmlns:wsse="{wsse}" xmlns:wsu="{wsu}"><wsse:UsernameToken><wsse:Username>{user}</wsse:Username><wsse:Password Type="{pwd_type}">{pwd}</wsse:Password><wsse:Nonce EncodingType="{nonce_enc}">{nonce}</wsse:Nonce><wsu:Created>{created}</wsu:Created></wsse:UsernameToken></wsse:Security>"#,
            wsse = NS_WSSE,
            wsu = NS_WSU,
            user = escape(self.username.as_str()),
            pwd_type = PASSWORD_DIGEST,
            pwd = self.digest,
            nonce_enc = NONCE_ENCODING,
            nonce = self.nonce,
            created = self.created,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CREATED: &str = "2024-01-01T00:00:00Z";

    #[test]
    fn digest_depends_on_every_input() {
        let base = UsernameToken::with_nonce("admin", "secret", b"0123456789abcdef", CREATED);
        let same = UsernameToken::with_nonce("admin", "secret", b"0123456789abcdef", CREATED);
        assert_eq!(base, same);

        let other_pwd = UsernameToken::with_nonce("admin", "other", b"0123456789abcdef", CREATED);
        let other_nonce = UsernameToken::with_nonce("admin", "secret", b"fedcba9876543210", CREATED);
        let other_time =
            UsernameToken::with_nonce("admin", "secret", b"0123456789abcdef", "2024-01-01T00:00:01Z");

        assert_ne!(base.password_digest(), other_pwd.password_digest());
        assert_ne!(base.password_digest(), other_nonce.password_digest());
        assert_ne!(base.password_digest(), other_time.password_digest());
    }

    #[test]
    fn digest_known_answer() {
        // Base64(SHA1("0123456789abcdef" + CREATED + "secret"))
        let token = UsernameToken::with_nonce("admin", "secret", b"0123456789abcdef", CREATED);

        assert_eq!(token.password_digest(), "W+AMPWIcgBDGW9XpBeBhrAdNo+g=");
        assert_eq!(token.nonce(), "MDEyMzQ1Njc4OWFiY2RlZg==");
    }

    #[test]
    fn digest_is_base64_sha1() {
        let token = UsernameToken::with_nonce("admin", "secret", b"nonce", CREATED);
        let raw = BASE64.decode(token.password_digest()).unwrap();

        assert_eq!(raw.len(), 20);
        assert_eq!(BASE64.decode(token.nonce()).unwrap(), b"nonce");
    }

    #[test]
    fn fresh_tokens_use_fresh_nonces() {
        let a = UsernameToken::new("admin", "secret");
        let b = UsernameToken::new("admin", "secret");
        assert_ne!(a.nonce(), b.nonce());
    }

    #[test]
    fn header_escapes_username() {
        let token = UsernameToken::with_nonce("a<b&c", "pwd", b"n", CREATED);
        let xml = token.to_xml();

        assert!(xml.contains("<wsse:Username>a&lt;b&amp;c</wsse:Username>"));
        assert!(xml.contains("#PasswordDigest"));
        assert!(xml.contains(&format!("<wsu:Created>{CREATED}</wsu:Created>")));
    }
}
