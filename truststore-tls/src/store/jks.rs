//! Reader for Java `JKS` and `JCEKS` keystores.
//!
//! Layout (all integers big-endian):
//!
//! ```text
//! magic u32 | version u32 | count u32
//! count × entry:
//!     tag u32 | alias (u16 len + modified UTF-8) | timestamp u64
//!     tag 1  private key:   u32 len + protected key, u32 chain len, chain certs
//!     tag 2  trusted cert:  cert
//!     tag 3  secret key:    serialized Java object (JCEKS only)
//! cert: [type (u16 len + UTF-8), version 2 only] u32 len + DER
//! digest: SHA-1(password as UTF-16BE | "Mighty Aphrodite" | everything above)
//! ```
//!
//! Only certificates are extracted. For private key entries the first
//! certificate of the chain counts as trusted, matching how JSSE builds its
//! trust anchors from a keystore.

use rustls_pki_types::CertificateDer;
use secrecy::{ExposeSecret, SecretString};
use sha1::{Digest, Sha1};
use tracing::trace;

use super::StoreType;
use crate::error::TrustStoreResult;
use crate::format_error;

pub const JKS_MAGIC: u32 = 0xFEED_FEED;
pub const JCEKS_MAGIC: u32 = 0xCECE_CECE;

const TAG_PRIVATE_KEY: u32 = 1;
const TAG_TRUSTED_CERT: u32 = 2;
const TAG_SECRET_KEY: u32 = 3;

const WHITENER: &[u8] = b"Mighty Aphrodite";
const DIGEST_LEN: usize = 20;
const X509: &str = "X.509";

/// Extract every certificate from a JKS or JCEKS image.
///
/// With a password the trailing integrity digest is verified first; a
/// mismatch means the password is wrong or the file was altered.
pub fn read_anchors(
    bytes: &[u8],
    password: Option<&SecretString>,
    store_type: StoreType,
) -> TrustStoreResult<Vec<CertificateDer<'static>>> {
    if bytes.len() < 12 + DIGEST_LEN {
        return Err(format_error!("{store_type} keystore is truncated"));
    }
    let (body, digest) = bytes.split_at(bytes.len() - DIGEST_LEN);

    let mut r = Reader::new(body);
    let magic = r.u32()?;
    let accepted = match store_type {
        StoreType::Jceks => magic == JCEKS_MAGIC || magic == JKS_MAGIC,
        _ => magic == JKS_MAGIC,
    };
    if !accepted {
        return Err(format_error!(
            "invalid {store_type} keystore format (magic {magic:#010x})"
        ));
    }

    if let Some(password) = password
        && integrity_digest(password.expose_secret(), body).as_slice() != digest
    {
        return Err(format_error!(
            "{store_type} keystore was tampered with, or password was incorrect"
        ));
    }

    let version = r.u32()?;
    if version != 1 && version != 2 {
        return Err(format_error!("unsupported {store_type} keystore version {version}"));
    }
    let count = r.u32()?;

    let mut anchors = Vec::with_capacity(count.min(64) as usize);
    for _ in 0..count {
        let tag = r.u32()?;
        let alias = r.utf()?;
        let _timestamp = r.u64()?;
        match tag {
            TAG_TRUSTED_CERT => {
                trace!(%alias, "trusted certificate entry");
                anchors.push(r.cert(version)?);
            }
            TAG_PRIVATE_KEY => {
                trace!(%alias, "private key entry");
                let key_len = r.u32()? as usize;
                r.take(key_len)?;
                let chain_len = r.u32()?;
                for i in 0..chain_len {
                    let cert = r.cert(version)?;
                    if i == 0 {
                        anchors.push(cert);
                    }
                }
            }
            TAG_SECRET_KEY => {
                return Err(format_error!(
                    "{store_type} entry {alias:?} holds a secret key, which cannot be skipped"
                ));
            }
            other => {
                return Err(format_error!("unknown {store_type} entry tag {other} for {alias:?}"));
            }
        }
    }

    if !r.is_empty() {
        return Err(format_error!("{store_type} keystore has trailing data"));
    }
    Ok(anchors)
}

/// SHA-1 keyed the way `JavaKeyStore` does it.
pub fn integrity_digest(password: &str, body: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha1::new();
    for unit in password.encode_utf16() {
        hasher.update(unit.to_be_bytes());
    }
    hasher.update(WHITENER);
    hasher.update(body);
    hasher.finalize().into()
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos == self.buf.len()
    }

    fn take(&mut self, n: usize) -> TrustStoreResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| format_error!("keystore truncated at offset {}", self.pos))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u16(&mut self) -> TrustStoreResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> TrustStoreResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> TrustStoreResult<u64> {
        let b = self.take(8)?;
        let mut a = [0u8; 8];
        a.copy_from_slice(b);
        Ok(u64::from_be_bytes(a))
    }

    // Java's modified UTF-8 only differs for NUL and supplementary chars,
    // neither of which matter for aliases and type names.
    fn utf(&mut self) -> TrustStoreResult<String> {
        let len = self.u16()? as usize;
        Ok(String::from_utf8_lossy(self.take(len)?).into_owned())
    }

    fn cert(&mut self, version: u32) -> TrustStoreResult<CertificateDer<'static>> {
        if version == 2 {
            let cert_type = self.utf()?;
            if cert_type != X509 {
                return Err(format_error!("unsupported certificate type {cert_type:?}"));
            }
        }
        let len = self.u32()? as usize;
        Ok(CertificateDer::from(self.take(len)?.to_vec()))
    }
}
