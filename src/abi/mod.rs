//! Call arguments as serialized by the fuzzer: a tagged tree whose shape is
//! fixed by the tag. Values and element types are closed enums, so anything
//! the codec doesn't know is rejected when the corpus file is parsed.

use std::fmt;

use num_bigint::{BigInt, BigUint};
use serde::{Deserialize, Serialize};

use crate::{
    echidna,
    error::Result,
    symbolic::{VarContext, VarPath},
    util,
};

pub(crate) mod encode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", content = "contents")]
pub(crate) enum AbiValue {
    /// Bit width and decimal value.
    AbiUInt(u16, String),
    AbiInt(u16, String),
    /// Hex string.
    AbiAddress(String),
    AbiBool(bool),
    /// Byte length and the byte string.
    AbiBytes(usize, String),
    AbiBytesDynamic(String),
    AbiString(String),
    AbiArrayDynamic(AbiType, Vec<AbiValue>),
    AbiArray(usize, AbiType, Vec<AbiValue>),
    AbiTuple(Vec<AbiValue>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "tag", content = "contents")]
pub(crate) enum AbiType {
    AbiUIntType(u16),
    AbiIntType(u16),
    AbiAddressType,
    AbiBoolType,
    AbiBytesType(usize),
    AbiBytesDynamicType,
    AbiStringType,
    AbiArrayDynamicType(Box<AbiType>),
    AbiArrayType(usize, Box<AbiType>),
    AbiTupleType(Vec<AbiType>),
}

impl AbiType {
    pub(crate) fn is_dynamic(&self) -> bool {
        match self {
            Self::AbiUIntType(_)
            | Self::AbiIntType(_)
            | Self::AbiAddressType
            | Self::AbiBoolType
            | Self::AbiBytesType(_) => false,
            Self::AbiBytesDynamicType | Self::AbiStringType | Self::AbiArrayDynamicType(_) => true,
            Self::AbiArrayType(_, elem) => elem.is_dynamic(),
            Self::AbiTupleType(elems) => elems.iter().any(Self::is_dynamic),
        }
    }
}

/// Canonical type signature, as used in function selectors.
impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AbiUIntType(bits) => write!(f, "uint{bits}"),
            Self::AbiIntType(bits) => write!(f, "int{bits}"),
            Self::AbiAddressType => f.write_str("address"),
            Self::AbiBoolType => f.write_str("bool"),
            Self::AbiBytesType(len) => write!(f, "bytes{len}"),
            Self::AbiBytesDynamicType => f.write_str("bytes"),
            Self::AbiStringType => f.write_str("string"),
            Self::AbiArrayDynamicType(elem) => write!(f, "{elem}[]"),
            Self::AbiArrayType(len, elem) => write!(f, "{elem}[{len}]"),
            Self::AbiTupleType(elems) => {
                f.write_str("(")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{elem}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Argument value with the type information stripped. Integers carry no
/// width or signedness; that lives in the accompanying [`AbiType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NativeValue {
    Int(BigInt),
    Bool(bool),
    Bytes(Vec<u8>),
    Seq(Vec<NativeValue>),
}

impl AbiValue {
    pub(crate) fn abi_type(&self) -> AbiType {
        match self {
            Self::AbiUInt(bits, _) => AbiType::AbiUIntType(*bits),
            Self::AbiInt(bits, _) => AbiType::AbiIntType(*bits),
            Self::AbiAddress(_) => AbiType::AbiAddressType,
            Self::AbiBool(_) => AbiType::AbiBoolType,
            Self::AbiBytes(len, _) => AbiType::AbiBytesType(*len),
            Self::AbiBytesDynamic(_) => AbiType::AbiBytesDynamicType,
            Self::AbiString(_) => AbiType::AbiStringType,
            Self::AbiArrayDynamic(elem, _) => AbiType::AbiArrayDynamicType(Box::new(elem.clone())),
            Self::AbiArray(len, elem, _) => AbiType::AbiArrayType(*len, Box::new(elem.clone())),
            Self::AbiTuple(elems) => AbiType::AbiTupleType(elems.iter().map(Self::abi_type).collect()),
        }
    }

    pub(crate) fn type_string(&self) -> String {
        self.abi_type().to_string()
    }

    pub(crate) fn decode(&self) -> Result<NativeValue> {
        Ok(match self {
            Self::AbiUInt(_, val) | Self::AbiInt(_, val) => NativeValue::Int(util::parse_dec_int(val)?),
            Self::AbiAddress(addr) => NativeValue::Int(util::parse_hex_int(addr)?.into()),
            Self::AbiBool(val) => NativeValue::Bool(*val),
            Self::AbiBytes(_, data) | Self::AbiBytesDynamic(data) | Self::AbiString(data) => {
                NativeValue::Bytes(echidna::parse_bytes(data)?)
            }
            Self::AbiArrayDynamic(_, elems) | Self::AbiArray(_, _, elems) | Self::AbiTuple(elems) => {
                NativeValue::Seq(elems.iter().map(Self::decode).collect::<Result<_>>()?)
            }
        })
    }

    pub(crate) fn translate(&self) -> Result<(AbiType, NativeValue)> {
        Ok((self.abi_type(), self.decode()?))
    }

    /// Apply the part of `model` that concerns the variables rooted at
    /// `path`. Fields without an assignment keep their current value.
    pub(crate) fn update(&self, path: &VarPath, model: &VarContext) -> Result<AbiValue> {
        Ok(match self {
            Self::AbiUInt(bits, _) => match model.get(path) {
                Some(val) => {
                    Self::AbiUInt(*bits, util::mask(val, u32::from(*bits)).to_string())
                }
                None => self.clone(),
            },
            Self::AbiInt(bits, _) => match model.get(path) {
                Some(val) => Self::AbiInt(
                    *bits,
                    util::twos_complement_convert(val, u32::from(*bits)).to_string(),
                ),
                None => self.clone(),
            },
            Self::AbiBool(_) => match model.get(path) {
                Some(val) => Self::AbiBool(util::int_to_bool(val)),
                None => self.clone(),
            },
            Self::AbiAddress(_) => match model.get(path) {
                Some(val) => Self::AbiAddress(util::to_address(val)),
                None => self.clone(),
            },
            _ if !model.contains_under(path) => self.clone(),
            Self::AbiBytes(len, data) => Self::AbiBytes(*len, update_bytes(data, path, model)?),
            Self::AbiBytesDynamic(data) => Self::AbiBytesDynamic(update_bytes(data, path, model)?),
            Self::AbiString(data) => Self::AbiString(update_bytes(data, path, model)?),
            Self::AbiArrayDynamic(elem, elems) => {
                Self::AbiArrayDynamic(elem.clone(), update_elems(elems, path, model)?)
            }
            Self::AbiArray(len, elem, elems) => {
                Self::AbiArray(*len, elem.clone(), update_elems(elems, path, model)?)
            }
            Self::AbiTuple(elems) => Self::AbiTuple(update_elems(elems, path, model)?),
        })
    }
}

fn update_elems(elems: &[AbiValue], path: &VarPath, model: &VarContext) -> Result<Vec<AbiValue>> {
    elems
        .iter()
        .enumerate()
        .map(|(i, el)| el.update(&path.index(i), model))
        .collect()
}

fn update_bytes(data: &str, path: &VarPath, model: &VarContext) -> Result<String> {
    let mut bytes = echidna::parse_bytes(data)?;
    for (i, byte) in bytes.iter_mut().enumerate() {
        if let Some(val) = model.get(&path.index(i)) {
            *byte = low_byte(val);
        }
    }
    Ok(echidna::encode_bytes(&bytes))
}

fn low_byte(val: &BigUint) -> u8 {
    val.to_bytes_le().first().copied().unwrap_or(0)
}
