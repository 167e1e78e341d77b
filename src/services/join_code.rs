use rand::Rng;

/// Number of characters in a join code.
pub const JOIN_CODE_LENGTH: usize = 6;
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Draw a short shareable code uniformly from `[A-Z0-9]`.
///
/// Codes are not checked against existing lobbies: two lobbies may share one.
pub fn generate_join_code() -> String {
    generate_join_code_with(&mut rand::rng())
}

fn generate_join_code_with<R: Rng>(rng: &mut R) -> String {
    (0..JOIN_CODE_LENGTH)
        .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
        .collect()
}

/// Whether `code` has the shape produced by [`generate_join_code`].
pub fn is_valid_join_code(code: &str) -> bool {
    code.len() == JOIN_CODE_LENGTH
        && code
            .bytes()
            .all(|byte| byte.is_ascii_uppercase() || byte.is_ascii_digit())
}
