use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{Num, One, Zero};

use crate::error::{Error, Result};

pub(crate) fn parse_hex_int(s: &str) -> Result<BigUint> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.is_empty() {
        return Ok(BigUint::zero());
    }
    BigUint::from_str_radix(digits, 16)
        .map_err(|_| Error::unsupported(format!("invalid hex integer {s:?}")))
}

pub(crate) fn parse_dec_int(s: &str) -> Result<BigInt> {
    BigInt::from_str_radix(s.trim(), 10)
        .map_err(|_| Error::unsupported(format!("invalid decimal integer {s:?}")))
}

/// Lowercase `0x`-prefixed hex without padding.
pub(crate) fn to_hex(val: &BigUint) -> String {
    format!("{val:#x}")
}

pub(crate) fn to_address(val: &BigUint) -> String {
    format!("0x{:040x}", mask(val, 160))
}

pub(crate) fn mask(val: &BigUint, bits: u32) -> BigUint {
    let m = (BigUint::one() << bits) - 1u32;
    val & &m
}

/// Reinterpret the low `bits` bits of `val` as a signed integer.
pub(crate) fn twos_complement_convert(val: &BigUint, bits: u32) -> BigInt {
    let val = mask(val, bits);
    if bits > 0 && val.bit(u64::from(bits - 1)) {
        BigInt::from(val) - (BigInt::one() << bits)
    } else {
        BigInt::from(val)
    }
}

/// Bit pattern of `val` in a `bits` wide two's-complement representation.
pub(crate) fn to_twos_complement(val: &BigInt, bits: u32) -> BigUint {
    let modulus = BigInt::one() << bits;
    let wrapped = ((val % &modulus) + &modulus) % &modulus;
    wrapped.magnitude().clone()
}

pub(crate) fn int_to_bool(val: &BigUint) -> bool {
    !val.is_zero()
}

pub(crate) fn biguint_of(val: &BigInt) -> Option<BigUint> {
    match val.sign() {
        Sign::Minus => None,
        _ => Some(val.magnitude().clone()),
    }
}

pub(crate) fn ser_biguint<S: serde::Serializer>(val: &BigUint, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&to_hex(val))
}

pub(crate) fn ser_opt_biguint<S: serde::Serializer>(
    val: &Option<BigUint>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match val {
        Some(val) => s.serialize_some(&to_hex(val)),
        None => s.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twos_complement() {
        assert_eq!(twos_complement_convert(&200u32.into(), 8), BigInt::from(-56));
        assert_eq!(twos_complement_convert(&100u32.into(), 8), BigInt::from(100));
        assert_eq!(twos_complement_convert(&0xffffu32.into(), 16), BigInt::from(-1));
        assert_eq!(to_twos_complement(&BigInt::from(-56), 8), BigUint::from(200u32));
        assert_eq!(to_twos_complement(&BigInt::from(7), 8), BigUint::from(7u32));
    }

    #[test]
    fn test_hex() {
        assert_eq!(parse_hex_int("0x1f").unwrap(), BigUint::from(31u32));
        assert_eq!(parse_hex_int("0x").unwrap(), BigUint::zero());
        assert!(parse_hex_int("0xzz").is_err());
        assert_eq!(to_hex(&BigUint::from(31u32)), "0x1f");
        assert_eq!(to_hex(&BigUint::zero()), "0x0");
        assert_eq!(
            to_address(&BigUint::from(0xabcu32)),
            "0x0000000000000000000000000000000000000abc"
        );
    }
}
