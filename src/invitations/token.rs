use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

const TOKEN_BYTES: usize = 32;

/// A fresh invitation token and the digest stored in its place.
pub struct InvitationToken {
    pub token: String,
    pub hash: String,
}

pub fn generate_token() -> InvitationToken {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = BASE64_URL.encode(bytes);
    let hash = hash_token(&token);
    InvitationToken { token, hash }
}

/// Lower-case hex SHA-256 of the token as handed to the invitee.
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.trim().as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
