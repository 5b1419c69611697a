//! HTTP Signatures for outbound ActivityPub requests
//!
//! Signs requests per:
//! https://docs.joinmastodon.org/spec/security/
//!
//! Inbound verification is out of scope: no public keys are stored for
//! remote actors.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use sha2::{Digest, Sha256};

use crate::error::AppError;

/// Headers to add for a signed request
#[derive(Debug, Clone)]
pub struct SignatureHeaders {
    /// Signature header value
    pub signature: String,
    /// Date header value (RFC 2616)
    pub date: String,
    /// Digest header value (if body present)
    pub digest: Option<String>,
}

/// Generate SHA-256 digest header value for a body
fn generate_digest(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    format!("SHA-256={}", BASE64.encode(digest))
}

/// Sign an HTTP request
///
/// Creates an HTTP Signature header for outgoing requests over
/// `(request-target) host date [digest]`.
///
/// # Arguments
/// * `method` - HTTP method (e.g., "POST")
/// * `url` - Full URL being requested
/// * `body` - Request body (for digest)
/// * `private_key_pem` - RSA private key in PEM format
/// * `key_id` - Full URL to the public key (actor#main-key)
pub fn sign_request(
    method: &str,
    url: &str,
    body: Option<&[u8]>,
    private_key_pem: &str,
    key_id: &str,
) -> Result<SignatureHeaders, AppError> {
    // 1. Parse URL to get host and path
    let parsed_url =
        url::Url::parse(url).map_err(|e| AppError::Validation(format!("Invalid URL: {}", e)))?;

    let host = parsed_url
        .host_str()
        .ok_or_else(|| AppError::Validation("Missing host in URL".to_string()))?;

    let path = parsed_url.path();
    let query = parsed_url.query();
    let path_and_query = if let Some(q) = query {
        format!("{}?{}", path, q)
    } else {
        path.to_string()
    };

    // 2. Generate Date header (RFC 2822 format)
    let date = chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string();

    // 3. Generate Digest if body present
    let digest = body.map(generate_digest);

    // 4. Build signing string
    let request_target = format!("{} {}", method.to_lowercase(), path_and_query);

    let mut signing_parts = vec![
        format!("(request-target): {}", request_target),
        format!("host: {}", host),
        format!("date: {}", date),
    ];

    let mut headers_list = vec!["(request-target)", "host", "date"];

    if let Some(ref digest_value) = digest {
        signing_parts.push(format!("digest: {}", digest_value));
        headers_list.push("digest");
    }

    let signing_string = signing_parts.join("\n");

    // 5. Sign with RSA-SHA256
    use rsa::pkcs8::DecodePrivateKey;
    use rsa::signature::{RandomizedSigner, SignatureEncoding};

    let private_key = rsa::RsaPrivateKey::from_pkcs8_pem(private_key_pem)
        .map_err(|e| AppError::Encryption(format!("Invalid private key: {}", e)))?;

    let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new_unprefixed(private_key);
    let mut rng = rand::thread_rng();
    let signature = signing_key.sign_with_rng(&mut rng, signing_string.as_bytes());
    let signature_b64 = BASE64.encode(signature.to_bytes());

    // 6. Build Signature header
    let signature_header = format!(
        "keyId=\"{}\",algorithm=\"rsa-sha256\",headers=\"{}\",signature=\"{}\"",
        key_id,
        headers_list.join(" "),
        signature_b64
    );

    Ok(SignatureHeaders {
        signature: signature_header,
        date,
        digest,
    })
}

/// Generate a fresh RSA private key as PKCS#8 PEM.
///
/// Used once at startup to mint the instance signing key.
pub fn generate_private_key_pem(bits: usize) -> Result<String, AppError> {
    use rsa::RsaPrivateKey;
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};

    let mut rng = rand::thread_rng();
    let private_key =
        RsaPrivateKey::new(&mut rng, bits).map_err(|e| AppError::Encryption(e.to_string()))?;
    Ok(private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| AppError::Encryption(e.to_string()))?
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_request_includes_digest_for_bodies() {
        let pem = generate_private_key_pem(2048).unwrap();

        let headers = sign_request(
            "POST",
            "https://remote.example/inbox",
            Some(b"{}"),
            &pem,
            "https://local.example/ap/actors/local.example#main-key",
        )
        .unwrap();

        assert!(headers.digest.unwrap().starts_with("SHA-256="));
        assert!(headers.signature.contains("algorithm=\"rsa-sha256\""));
        assert!(
            headers
                .signature
                .contains("headers=\"(request-target) host date digest\"")
        );
    }

    #[test]
    fn sign_request_omits_digest_without_body() {
        let pem = generate_private_key_pem(2048).unwrap();

        let headers = sign_request(
            "GET",
            "https://remote.example/actors/someone",
            None,
            &pem,
            "https://local.example/ap/actors/local.example#main-key",
        )
        .unwrap();

        assert!(headers.digest.is_none());
        assert!(
            headers
                .signature
                .contains("headers=\"(request-target) host date\"")
        );
    }
}
