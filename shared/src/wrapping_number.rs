/// Whether `s1` comes after `s2` in a wrapping u16 sequence, so that a
/// transfer session id that rolled over past 65535 still counts as newer.
/// sequence_greater_than(2, 1) is true, sequence_greater_than(0, 65535) is true,
/// sequence_greater_than(1, 1) is false
pub fn sequence_greater_than(s1: u16, s2: u16) -> bool {
    ((s1 > s2) && (s1 - s2 <= 32768)) || ((s1 < s2) && (s2 - s1 > 32768))
}

pub fn sequence_less_than(s1: u16, s2: u16) -> bool {
    sequence_greater_than(s2, s1)
}

/// Signed distance from `a` forward to `b`, across the wrap point
/// ```
/// # use tilesync_shared::wrapping_diff;
/// assert_eq!(wrapping_diff(1, 2), 1);
/// assert_eq!(wrapping_diff(2, 1), -1);
/// assert_eq!(wrapping_diff(65535, 0), 1);
/// ```
pub fn wrapping_diff(a: u16, b: u16) -> i16 {
    b.wrapping_sub(a) as i16
}
