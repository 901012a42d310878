/// Content-based sampling filter for blocks of files added by changes.
///
/// A block survives iff its fingerprint starts with `000` and the fourth
/// character is a hex digit no greater than 7, which keeps roughly one
/// block in 8192.
pub(crate) fn is_sampled(fingerprint: &str) -> bool {
    let bytes = fingerprint.as_bytes();
    if bytes.len() < 4 || !bytes.starts_with(b"000") {
        return false;
    }
    char::from(bytes[3]).to_digit(16).is_some_and(|nybble| nybble <= 7)
}
