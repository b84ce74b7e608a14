//! ABI encoding of a function call where every scalar and every byte of
//! dynamic data is a variable seeded with the concrete argument.
//! Lengths, offsets and padding stay constant.

use num_bigint::BigUint;
use sha3::{Digest, Keccak256};

use super::{AbiType, NativeValue};
use crate::{
    error::{Error, Result},
    symbolic::{CallData, SymExpr, TxField, VarContext, VarPath},
    util,
};

const WORD_BITS: u32 = 256;
const WORD_BYTES: usize = 32;

pub(crate) fn signature(func_name: &str, arg_types: &[AbiType]) -> String {
    let types: Vec<String> = arg_types.iter().map(ToString::to_string).collect();
    format!("{func_name}({})", types.join(","))
}

pub(crate) fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Build the call data for `func_name(args...)` and register one variable
/// per argument leaf in `ctx`, named after `tx_name_arg<j>...`.
pub(crate) fn function_call(
    func_name: &str,
    args: &[(AbiType, NativeValue)],
    ctx: &mut VarContext,
    tx_name: &str,
) -> Result<CallData> {
    let types: Vec<AbiType> = args.iter().map(|(ty, _)| ty.clone()).collect();
    let sel = selector(&signature(func_name, &types));
    let mut parts = vec![SymExpr::cst(32, BigUint::from_bytes_be(&sel))];
    let items: Vec<_> = args
        .iter()
        .enumerate()
        .map(|(j, (ty, val))| (ty, val, VarPath::new(tx_name, TxField::Arg(j))))
        .collect();
    parts.extend(Encoder { ctx }.encode_seq(&items)?);
    Ok(CallData::new(parts))
}

struct Encoder<'a> {
    ctx: &'a mut VarContext,
}

impl Encoder<'_> {
    fn encode(&mut self, ty: &AbiType, val: &NativeValue, path: &VarPath) -> Result<Vec<SymExpr>> {
        let mismatch = || Error::unsupported(format!("value {val:?} doesn't match type {ty}"));
        Ok(match (ty, val) {
            (AbiType::AbiUIntType(bits), NativeValue::Int(n)) => {
                let bits = u32::from(*bits);
                let seed = util::to_twos_complement(n, bits);
                vec![widen(SymExpr::var(self.ctx, path, bits, &seed), false)]
            }
            (AbiType::AbiIntType(bits), NativeValue::Int(n)) => {
                let bits = u32::from(*bits);
                let seed = util::to_twos_complement(n, bits);
                vec![widen(SymExpr::var(self.ctx, path, bits, &seed), true)]
            }
            (AbiType::AbiAddressType, NativeValue::Int(n)) => {
                let seed = util::to_twos_complement(n, 160);
                vec![widen(SymExpr::var(self.ctx, path, 160, &seed), false)]
            }
            (AbiType::AbiBoolType, NativeValue::Bool(b)) => {
                let seed = BigUint::from(u8::from(*b));
                vec![widen(SymExpr::var(self.ctx, path, 1, &seed), false)]
            }
            (AbiType::AbiBytesType(len), NativeValue::Bytes(bytes)) => {
                if bytes.len() != *len || *len > WORD_BYTES {
                    return Err(mismatch());
                }
                let mut parts = self.bytes(bytes, path);
                parts.extend(padding(bytes.len()));
                parts
            }
            (AbiType::AbiBytesDynamicType | AbiType::AbiStringType, NativeValue::Bytes(bytes)) => {
                let mut parts = vec![word(bytes.len())];
                parts.extend(self.bytes(bytes, path));
                parts.extend(padding(bytes.len()));
                parts
            }
            (AbiType::AbiArrayType(len, elem), NativeValue::Seq(elems)) => {
                if elems.len() != *len {
                    return Err(mismatch());
                }
                let items = Self::indexed(std::iter::repeat(elem.as_ref()), elems, path);
                self.encode_seq(&items)?
            }
            (AbiType::AbiArrayDynamicType(elem), NativeValue::Seq(elems)) => {
                let items = Self::indexed(std::iter::repeat(elem.as_ref()), elems, path);
                let mut parts = vec![word(elems.len())];
                parts.extend(self.encode_seq(&items)?);
                parts
            }
            (AbiType::AbiTupleType(types), NativeValue::Seq(elems)) => {
                if elems.len() != types.len() {
                    return Err(mismatch());
                }
                let items = Self::indexed(types.iter(), elems, path);
                self.encode_seq(&items)?
            }
            _ => return Err(mismatch()),
        })
    }

    fn indexed<'t, 'v>(
        types: impl Iterator<Item = &'t AbiType>,
        elems: &'v [NativeValue],
        path: &VarPath,
    ) -> Vec<(&'t AbiType, &'v NativeValue, VarPath)> {
        types
            .zip(elems)
            .enumerate()
            .map(|(i, (ty, val))| (ty, val, path.index(i)))
            .collect()
    }

    fn bytes(&mut self, bytes: &[u8], path: &VarPath) -> Vec<SymExpr> {
        bytes
            .iter()
            .enumerate()
            .map(|(i, b)| SymExpr::var(self.ctx, &path.index(i), 8, &BigUint::from(*b)))
            .collect()
    }

    /// Head/tail encoding of a tuple-like sequence. Offsets are relative to
    /// the start of the sequence.
    fn encode_seq(&mut self, items: &[(&AbiType, &NativeValue, VarPath)]) -> Result<Vec<SymExpr>> {
        let head_size: usize = items
            .iter()
            .map(|(ty, _, _)| static_size(ty))
            .sum();
        let mut heads = Vec::new();
        let mut tails = Vec::new();
        let mut tail_size = 0;
        for (ty, val, path) in items {
            let enc = self.encode(ty, val, path)?;
            if ty.is_dynamic() {
                heads.push(word(head_size + tail_size));
                tail_size += byte_len(&enc);
                tails.extend(enc);
            } else {
                heads.extend(enc);
            }
        }
        heads.extend(tails);
        Ok(heads)
    }
}

/// Size of the head slot of `ty`: the full encoding for static types,
/// one offset word for dynamic ones.
fn static_size(ty: &AbiType) -> usize {
    if ty.is_dynamic() {
        return WORD_BYTES;
    }
    match ty {
        AbiType::AbiArrayType(len, elem) => len * static_size(elem),
        AbiType::AbiTupleType(elems) => elems.iter().map(static_size).sum(),
        _ => WORD_BYTES,
    }
}

fn widen(expr: SymExpr, signed: bool) -> SymExpr {
    match expr.bits() {
        WORD_BITS => expr,
        _ if signed => expr.sign_ext(WORD_BITS),
        _ => expr.zero_ext(WORD_BITS),
    }
}

fn word(val: usize) -> SymExpr {
    SymExpr::cst(WORD_BITS, val)
}

fn padding(len: usize) -> Option<SymExpr> {
    match len % WORD_BYTES {
        0 => None,
        rem => Some(SymExpr::cst(((WORD_BYTES - rem) * 8) as u32, 0u32)),
    }
}

fn byte_len(parts: &[SymExpr]) -> usize {
    parts.iter().map(|p| p.bits() as usize / 8).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    fn int(n: i64) -> NativeValue {
        NativeValue::Int(BigInt::from(n))
    }

    fn concrete_hex(func: &str, args: &[(AbiType, NativeValue)]) -> (String, VarContext) {
        let mut ctx = VarContext::new();
        let data = function_call(func, args, &mut ctx, "tx0").unwrap();
        let bytes = data.concretize(&ctx).unwrap();
        assert_eq!(bytes.len(), data.len_bytes());
        (hex::encode(bytes), ctx)
    }

    fn words(ws: &[&str]) -> String {
        ws.iter().map(|w| format!("{w:0>64}")).collect()
    }

    fn words_right(w: &str) -> String {
        format!("{w:0<64}")
    }

    #[test]
    fn test_selector() {
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
        assert_eq!(hex::encode(selector("balanceOf(address)")), "70a08231");
    }

    #[test]
    fn test_static_args() {
        let (data, ctx) = concrete_hex(
            "transfer",
            &[
                (AbiType::AbiAddressType, int(0xdead)),
                (AbiType::AbiUIntType(256), int(1000)),
            ],
        );
        assert_eq!(data, format!("a9059cbb{}", words(&["dead", "3e8"])));
        assert_eq!(ctx.bits("tx0_arg0"), Some(160));
        assert_eq!(ctx.bits("tx0_arg1"), Some(256));
    }

    #[test]
    fn test_negative_int_is_sign_extended() {
        let (data, ctx) = concrete_hex("f", &[(AbiType::AbiIntType(8), int(-1))]);
        assert_eq!(&data[8..], "f".repeat(64));
        assert_eq!(ctx.get_name("tx0_arg0"), Some(&BigUint::from(0xffu32)));
    }

    #[test]
    fn test_dynamic_bytes() {
        let (data, ctx) = concrete_hex(
            "f",
            &[
                (AbiType::AbiBytesDynamicType, NativeValue::Bytes(b"abc".to_vec())),
                (AbiType::AbiBoolType, NativeValue::Bool(true)),
            ],
        );
        assert_eq!(
            &data[8..],
            format!("{}{}", words(&["40", "1", "3"]), words_right("616263"))
        );
        for i in 0..3 {
            assert_eq!(ctx.bits(&format!("tx0_arg0_{i}")), Some(8));
        }
        assert_eq!(ctx.bits("tx0_arg1"), Some(1));
        assert_eq!(ctx.bits("tx0_arg0"), None);
    }

    #[test]
    fn test_nested_dynamic_array() {
        let strings = AbiType::AbiArrayDynamicType(Box::new(AbiType::AbiStringType));
        let (data, ctx) = concrete_hex(
            "g",
            &[(
                strings,
                NativeValue::Seq(vec![
                    NativeValue::Bytes(b"ab".to_vec()),
                    NativeValue::Bytes(b"c".to_vec()),
                ]),
            )],
        );
        let expected = [
            words(&["20", "2", "40", "80", "2"]),
            words_right("6162"),
            words(&["1"]),
            words_right("63"),
        ]
        .concat();
        assert_eq!(&data[8..], expected);
        assert!(ctx.get(&VarPath::new("tx0", TxField::Arg(0)).index(1).index(0)).is_some());
    }

    #[test]
    fn test_fixed_bytes_and_static_tuple() {
        let (data, _) = concrete_hex(
            "h",
            &[
                (AbiType::AbiBytesType(2), NativeValue::Bytes(vec![0x12, 0x34])),
                (
                    AbiType::AbiTupleType(vec![AbiType::AbiUIntType(8), AbiType::AbiBoolType]),
                    NativeValue::Seq(vec![int(5), NativeValue::Bool(false)]),
                ),
            ],
        );
        assert_eq!(
            &data[8..],
            format!("{}{}", words_right("1234"), words(&["5", "0"]))
        );
    }

    #[test]
    fn test_shape_mismatch() {
        let mut ctx = VarContext::new();
        let res = function_call(
            "f",
            &[(AbiType::AbiBytesType(4), NativeValue::Bytes(vec![1, 2]))],
            &mut ctx,
            "tx0",
        );
        assert!(matches!(res, Err(Error::UnsupportedFormat(_))));
    }
}
