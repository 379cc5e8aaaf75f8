use rand::Rng;

pub const SHARE_CODE_LENGTH: usize = 6;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

pub fn generate_share_code() -> String {
    let mut rng = rand::thread_rng();
    (0..SHARE_CODE_LENGTH)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Cheap syntactic check so malformed codes never reach the repository.
pub fn is_valid_share_code(code: &str) -> bool {
    code.len() == SHARE_CODE_LENGTH && code.bytes().all(|b| ALPHABET.contains(&b))
}
