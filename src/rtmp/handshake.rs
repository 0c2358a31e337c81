// RTMP handshake utils

use std::sync::LazyLock;

use hmac::{Hmac, Mac};
use rand::{rngs::StdRng, RngCore, SeedableRng};
use sha2::Sha256;
use thiserror::Error;

use super::{GENUINE_FMS, GENUINE_FP, RANDOM_CRUD, RTMP_SIG_SIZE, SHA256DL, SHA256K};

/// Length of the client signature needed to locate both digest layouts
const DIGEST_LAYOUT_MIN_SIZE: usize = 776;

static GENUINE_FMS_PLUS_CRUD: LazyLock<Vec<u8>> = LazyLock::new(|| {
    let mut v: Vec<u8> = GENUINE_FMS.as_bytes().to_vec();
    v.extend(RANDOM_CRUD);
    v
});

/// Handshake failure
#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("signature too small: expected at least {expected} bytes, found {found}")]
    SignatureTooSmall { expected: usize, found: usize },

    #[error("invalid HMAC key")]
    InvalidKey,
}

/// Where the client placed its digest inside C1
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DigestLayout {
    /// Digest offset computed from bytes 8..12
    First,

    /// Digest offset computed from bytes 772..776
    Second,
}

/// Handshake flavour chosen from C1
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeMode {
    /// Plain echo handshake
    Basic,

    /// Flash Player digest handshake
    Digest(DigestLayout),
}

/// Server side of the handshake (S1 + S2), plus what is needed to check C2
pub struct HandshakeResponse {
    pub mode: HandshakeMode,
    pub s1: Vec<u8>,
    pub s2: Vec<u8>,
}

impl HandshakeResponse {
    /// Checks the client's C2 against what we sent.
    /// The basic handshake requires C2 to echo the random block of S1.
    /// The digest handshake only checks the size.
    pub fn validate_c2(&self, c2: &[u8]) -> bool {
        if c2.len() != RTMP_SIG_SIZE {
            return false;
        }

        match self.mode {
            HandshakeMode::Basic => c2[8..] == self.s1[8..],
            HandshakeMode::Digest(_) => true,
        }
    }
}

/// Generates the server handshake response for a client signature (C1)
///
/// # Arguments
///
/// * `client_signature` - C1
/// * `epoch` - Server timestamp written into S1 (basic handshake)
pub fn generate_s1_s2(
    client_signature: &[u8],
    epoch: u32,
) -> Result<HandshakeResponse, HandshakeError> {
    let mode = detect_client_message_format(client_signature)?;

    match mode {
        HandshakeMode::Basic => {
            let mut s1 = vec![0u8; RTMP_SIG_SIZE];
            s1[0..4].copy_from_slice(&epoch.to_be_bytes());
            StdRng::from_os_rng().fill_bytes(&mut s1[8..]);

            Ok(HandshakeResponse {
                mode,
                s1,
                s2: client_signature.to_vec(),
            })
        }
        HandshakeMode::Digest(layout) => Ok(HandshakeResponse {
            mode,
            s1: generate_s1(layout)?,
            s2: generate_s2(layout, client_signature)?,
        }),
    }
}

/// Generates a digest-signed S1
fn generate_s1(layout: DigestLayout) -> Result<Vec<u8>, HandshakeError> {
    let mut handshake_bytes: Vec<u8> = vec![0; RTMP_SIG_SIZE];

    handshake_bytes[4..8].copy_from_slice(&[1, 2, 3, 4]);
    StdRng::from_os_rng().fill_bytes(&mut handshake_bytes[8..]);

    let server_digest_offset = match layout {
        DigestLayout::First => get_client_genuine_const_digest_offset(&handshake_bytes[8..12]),
        DigestLayout::Second => get_server_genuine_const_digest_offset(&handshake_bytes[772..776]),
    };

    let msg = message_without_digest(&handshake_bytes, server_digest_offset)?;
    let h = calc_hmac(&msg, GENUINE_FMS.as_bytes())?;

    handshake_bytes[server_digest_offset..server_digest_offset + SHA256DL].copy_from_slice(&h);

    Ok(handshake_bytes)
}

/// Generates a digest-signed S2 from the client's challenge key
fn generate_s2(layout: DigestLayout, client_signature: &[u8]) -> Result<Vec<u8>, HandshakeError> {
    let challenge_key_offset = match layout {
        DigestLayout::First => get_client_genuine_const_digest_offset(&client_signature[8..12]),
        DigestLayout::Second => {
            get_server_genuine_const_digest_offset(&client_signature[772..776])
        }
    };

    check_size(client_signature, challenge_key_offset + SHA256K)?;

    let challenge_key = &client_signature[challenge_key_offset..challenge_key_offset + SHA256K];

    let mut s2_bytes = vec![0u8; RTMP_SIG_SIZE];
    StdRng::from_os_rng().fill_bytes(&mut s2_bytes[..RTMP_SIG_SIZE - SHA256DL]);

    let h = calc_hmac(challenge_key, &GENUINE_FMS_PLUS_CRUD)?;
    let signature = calc_hmac(&s2_bytes[..RTMP_SIG_SIZE - SHA256DL], &h)?;

    s2_bytes[RTMP_SIG_SIZE - SHA256DL..].copy_from_slice(&signature);

    Ok(s2_bytes)
}

/// Detects the handshake mode from the client signature
pub fn detect_client_message_format(
    client_signature: &[u8],
) -> Result<HandshakeMode, HandshakeError> {
    check_size(client_signature, DIGEST_LAYOUT_MIN_SIZE)?;

    let sdl = get_server_genuine_const_digest_offset(&client_signature[772..776]);

    if has_valid_client_digest(client_signature, sdl)? {
        return Ok(HandshakeMode::Digest(DigestLayout::Second));
    }

    let sdl = get_client_genuine_const_digest_offset(&client_signature[8..12]);

    if has_valid_client_digest(client_signature, sdl)? {
        return Ok(HandshakeMode::Digest(DigestLayout::First));
    }

    Ok(HandshakeMode::Basic)
}

fn has_valid_client_digest(
    client_signature: &[u8],
    offset: usize,
) -> Result<bool, HandshakeError> {
    let msg = message_without_digest(client_signature, offset)?;
    let computed = calc_hmac(&msg, GENUINE_FP.as_bytes())?;

    Ok(computed == client_signature[offset..offset + SHA256DL])
}

/// Returns the signature with the digest at `offset` cut out,
/// padded or truncated to 1504 bytes
fn message_without_digest(signature: &[u8], offset: usize) -> Result<Vec<u8>, HandshakeError> {
    check_size(signature, offset + SHA256DL)?;

    let mut msg = signature[..offset].to_vec();
    msg.extend(&signature[offset + SHA256DL..]);
    msg.resize(RTMP_SIG_SIZE - SHA256DL, 0);

    Ok(msg)
}

fn check_size(signature: &[u8], expected: usize) -> Result<(), HandshakeError> {
    if signature.len() < expected {
        return Err(HandshakeError::SignatureTooSmall {
            expected,
            found: signature.len(),
        });
    }

    Ok(())
}

/// Calculates HMAC-SHA256
fn calc_hmac(message: &[u8], key: &[u8]) -> Result<Vec<u8>, HandshakeError> {
    let mut mac: Hmac<Sha256> =
        Hmac::new_from_slice(key).map_err(|_| HandshakeError::InvalidKey)?;

    mac.update(message);

    Ok(mac.finalize().into_bytes().to_vec())
}

/// Digest offset, client layout
fn get_client_genuine_const_digest_offset(buf: &[u8]) -> usize {
    (buf.iter().take(4).map(|b| *b as usize).sum::<usize>() % 728) + 12
}

/// Digest offset, server layout
fn get_server_genuine_const_digest_offset(buf: &[u8]) -> usize {
    (buf.iter().take(4).map(|b| *b as usize).sum::<usize>() % 728) + 776
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a C1 signed the way Flash Player does (first layout)
    fn make_digest_c1() -> Vec<u8> {
        let mut c1 = vec![0u8; RTMP_SIG_SIZE];
        for (i, b) in c1.iter_mut().enumerate().skip(8) {
            *b = (i * 7 % 251) as u8;
        }

        let offset = get_client_genuine_const_digest_offset(&c1[8..12]);
        let msg = message_without_digest(&c1, offset).unwrap();
        let digest = calc_hmac(&msg, GENUINE_FP.as_bytes()).unwrap();
        c1[offset..offset + SHA256DL].copy_from_slice(&digest);

        c1
    }

    #[test]
    fn test_basic_handshake() {
        let c1 = vec![0x55u8; RTMP_SIG_SIZE];

        let response = generate_s1_s2(&c1, 1234).unwrap();

        assert_eq!(response.mode, HandshakeMode::Basic);
        assert_eq!(response.s1.len(), RTMP_SIG_SIZE);
        assert_eq!(&response.s1[0..8], &[0, 0, 0x04, 0xD2, 0, 0, 0, 0]);
        assert_eq!(response.s2, c1);

        let mut c2 = response.s1.clone();
        assert!(response.validate_c2(&c2));

        c2[100] ^= 0xFF;
        assert!(!response.validate_c2(&c2));
        assert!(!response.validate_c2(&response.s1[..100]));
    }

    #[test]
    fn test_digest_handshake() {
        let c1 = make_digest_c1();

        assert_eq!(
            detect_client_message_format(&c1).unwrap(),
            HandshakeMode::Digest(DigestLayout::First)
        );

        let response = generate_s1_s2(&c1, 0).unwrap();

        // S1 carries a server digest at the first layout offset
        let offset = get_client_genuine_const_digest_offset(&response.s1[8..12]);
        let msg = message_without_digest(&response.s1, offset).unwrap();
        let digest = calc_hmac(&msg, GENUINE_FMS.as_bytes()).unwrap();
        assert_eq!(&response.s1[offset..offset + SHA256DL], digest.as_slice());

        assert_eq!(response.s2.len(), RTMP_SIG_SIZE);
        assert!(response.validate_c2(&vec![0u8; RTMP_SIG_SIZE]));
    }

    #[test]
    fn test_short_signature() {
        assert!(matches!(
            generate_s1_s2(&[0u8; 100], 0),
            Err(HandshakeError::SignatureTooSmall { .. })
        ));
    }
}
