//! Lazy decomposition of `"<block> <street>"` addresses.

/// Split an address into its block token and street name.
///
/// Returns `None` when there is no street part.
pub fn split_block(address: &str) -> Option<(&str, &str)> {
    let (block, street) = address.split_once(' ')?;
    if block.is_empty() || street.is_empty() {
        return None;
    }
    Some((block, street))
}

/// The block token without its trailing wing letter, if it has one.
///
/// "123A" → Some("123"), "370" → None, "A" → None.
pub fn strip_suffix(block: &str) -> Option<&str> {
    let last = block.chars().last()?;
    if !last.is_ascii_alphabetic() {
        return None;
    }
    let stripped = &block[..block.len() - last.len_utf8()];
    if stripped.is_empty() {
        None
    } else {
        Some(stripped)
    }
}

/// The address with its block suffix removed, or `None` when the block token
/// carries no alphabetic suffix.
pub fn without_block_suffix(address: &str) -> Option<String> {
    let (block, street) = split_block(address)?;
    let stripped = strip_suffix(block)?;
    Some(format!("{} {}", stripped, street))
}

/// Leading token of an address, used to pick among candidates.
pub fn block_token(address: &str) -> &str {
    address.split(' ').next().unwrap_or("")
}
