use rand::{thread_rng, Rng};

/// Returns a string of `length` characters drawn uniformly from `charset`
pub fn random_string(length: usize, charset: &[u8]) -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| charset[rng.gen_range(0..charset.len())] as char)
        .take(length)
        .collect()
}
