use num_traits::PrimInt;
use std::str::FromStr;

pub(crate) fn parse_positive_int<T: PrimInt + FromStr>(int_str: &str) -> Option<T> {
    int_str
        .parse::<T>()
        .ok()
        .filter(|i| !i.is_zero())
}

pub(crate) fn digit_vec(int_str: &str) -> Vec<u8> {
    int_str
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|u| u as u8)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_int_rejects_zero_and_junk() {
        assert_eq!(parse_positive_int::<u8>("12"), Some(12));
        assert_eq!(parse_positive_int::<u8>("0"), None);
        assert_eq!(parse_positive_int::<u8>("x"), None);
    }

    #[test]
    fn digit_vec_skips_non_digits() {
        assert_eq!(digit_vec("64(1)3"), vec![6, 4, 1, 3]);
        assert_eq!(digit_vec(""), Vec::<u8>::new());
    }
}
