//! Abstract transactions as handed to the symbolic engine.
//!
//! Every solvable field is a [`SymExpr::Var`] whose name is derived from a
//! [`VarPath`]. The same path type is used when a solved model is written
//! back into a concrete transaction, so both directions agree on names.

use std::{collections::BTreeMap, fmt};

use num_bigint::BigUint;
use num_traits::One;
use serde::Serialize;

use crate::{
    error::{Error, Result},
    util::{self, ser_biguint},
};

pub(crate) mod engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TxField {
    Sender,
    Value,
    BlockNumInc,
    BlockTimestampInc,
    Arg(usize),
}

impl fmt::Display for TxField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sender => f.write_str("sender"),
            Self::Value => f.write_str("value"),
            Self::BlockNumInc => f.write_str("block_num_inc"),
            Self::BlockTimestampInc => f.write_str("block_timestamp_inc"),
            Self::Arg(idx) => write!(f, "arg{idx}"),
        }
    }
}

/// Location of a symbolic variable inside one transaction: the transaction
/// name, the top-level field and one index per level of nesting (tuple or
/// array element, or byte position inside byte-like data).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct VarPath {
    tx: String,
    field: TxField,
    indices: Vec<usize>,
}

impl VarPath {
    pub(crate) fn new(tx: &str, field: TxField) -> Self {
        Self {
            tx: tx.to_owned(),
            field,
            indices: Vec::new(),
        }
    }

    pub(crate) fn index(&self, idx: usize) -> Self {
        let mut res = self.clone();
        res.indices.push(idx);
        res
    }

    pub(crate) fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for VarPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.tx, self.field)?;
        for idx in &self.indices {
            write!(f, "_{idx}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct VarEntry {
    pub bits: u32,
    #[serde(serialize_with = "util::ser_opt_biguint")]
    pub value: Option<BigUint>,
}

/// Variable name -> bit width and (optionally) a concrete value.
///
/// Used both as the seed context of an [`AbstractTx`] and as the model a
/// solver returns. A name without a value is declared but unassigned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub(crate) struct VarContext {
    vars: BTreeMap<String, VarEntry>,
}

impl VarContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&mut self, path: &VarPath, value: &BigUint, bits: u32) {
        self.set_name(path.name(), value, bits);
    }

    pub(crate) fn set_name(&mut self, name: String, value: &BigUint, bits: u32) {
        let value = Some(util::mask(value, bits));
        self.vars.insert(name, VarEntry { bits, value });
    }

    pub(crate) fn get(&self, path: &VarPath) -> Option<&BigUint> {
        self.get_name(&path.name())
    }

    pub(crate) fn get_name(&self, name: &str) -> Option<&BigUint> {
        self.vars.get(name).and_then(|entry| entry.value.as_ref())
    }

    /// Whether any assigned variable is `path` itself or nested below it.
    pub(crate) fn contains_under(&self, path: &VarPath) -> bool {
        let name = path.name();
        let nested = format!("{name}_");
        self.vars
            .range(name.clone()..)
            .take_while(|(k, _)| k.starts_with(&name))
            .any(|(k, entry)| entry.value.is_some() && (*k == name || k.starts_with(&nested)))
    }

    pub(crate) fn bits(&self, name: &str) -> Option<u32> {
        self.vars.get(name).map(|entry| entry.bits)
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    pub(crate) fn len(&self) -> usize {
        self.vars.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Parse a solver assignment: a JSON object mapping variable names to a
    /// hex string, a decimal string, a number, or `null` for variables the
    /// solver left unconstrained. `null` on its own means "no model".
    pub(crate) fn from_assignment_json(text: &str) -> Result<Option<Self>> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let obj = match value {
            serde_json::Value::Null => return Ok(None),
            serde_json::Value::Object(obj) => obj,
            other => {
                return Err(Error::unsupported(format!(
                    "model must be a JSON object, got {other}"
                )));
            }
        };
        let mut ctx = Self::new();
        for (name, val) in obj {
            let value = match &val {
                serde_json::Value::Null => None,
                serde_json::Value::Number(n) => match n.as_u64() {
                    Some(n) => Some(BigUint::from(n)),
                    None => {
                        return Err(Error::unsupported(format!(
                            "model value for {name} is not an unsigned integer: {n}"
                        )));
                    }
                },
                serde_json::Value::String(s) if s.starts_with("0x") || s.starts_with("0X") => {
                    Some(util::parse_hex_int(s)?)
                }
                serde_json::Value::String(s) => match util::biguint_of(&util::parse_dec_int(s)?) {
                    Some(v) => Some(v),
                    None => {
                        return Err(Error::unsupported(format!(
                            "model value for {name} is negative: {s}"
                        )));
                    }
                },
                other => {
                    return Err(Error::unsupported(format!(
                        "unsupported model value for {name}: {other}"
                    )));
                }
            };
            // The solver protocol carries no widths; everything is a word.
            ctx.vars.insert(name, VarEntry { bits: 256, value });
        }
        Ok(Some(ctx))
    }
}

/// Bit-vector expression over the variables of a [`VarContext`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum SymExpr {
    Cst {
        bits: u32,
        #[serde(serialize_with = "ser_biguint")]
        value: BigUint,
    },
    Var {
        bits: u32,
        name: String,
    },
    ZeroExt {
        bits: u32,
        inner: Box<SymExpr>,
    },
    SignExt {
        bits: u32,
        inner: Box<SymExpr>,
    },
}

impl SymExpr {
    pub(crate) fn cst(bits: u32, value: impl Into<BigUint>) -> Self {
        Self::Cst {
            bits,
            value: util::mask(&value.into(), bits),
        }
    }

    /// Declare `path` in `ctx` with its concrete seed value and return it as
    /// a variable.
    pub(crate) fn var(ctx: &mut VarContext, path: &VarPath, bits: u32, seed: &BigUint) -> Self {
        ctx.set(path, seed, bits);
        Self::Var {
            bits,
            name: path.name(),
        }
    }

    pub(crate) fn zero_ext(self, bits: u32) -> Self {
        Self::ZeroExt {
            bits,
            inner: Box::new(self),
        }
    }

    pub(crate) fn sign_ext(self, bits: u32) -> Self {
        Self::SignExt {
            bits,
            inner: Box::new(self),
        }
    }

    pub(crate) fn bits(&self) -> u32 {
        match self {
            Self::Cst { bits, .. }
            | Self::Var { bits, .. }
            | Self::ZeroExt { bits, .. }
            | Self::SignExt { bits, .. } => *bits,
        }
    }

    pub(crate) fn is_concrete(&self) -> bool {
        match self {
            Self::Cst { .. } => true,
            Self::Var { .. } => false,
            Self::ZeroExt { inner, .. } | Self::SignExt { inner, .. } => inner.is_concrete(),
        }
    }

    /// Concrete value under `ctx`, `None` if a variable has no value.
    pub(crate) fn eval(&self, ctx: &VarContext) -> Option<BigUint> {
        match self {
            Self::Cst { value, .. } => Some(value.clone()),
            Self::Var { bits, name } => ctx.get_name(name).map(|v| util::mask(v, *bits)),
            Self::ZeroExt { inner, .. } => inner.eval(ctx),
            Self::SignExt { bits, inner } => {
                let val = inner.eval(ctx)?;
                let inner_bits = inner.bits();
                if inner_bits > 0 && val.bit(u64::from(inner_bits - 1)) {
                    let ones = (BigUint::one() << *bits) - (BigUint::one() << inner_bits);
                    Some(val | ones)
                } else {
                    Some(val)
                }
            }
        }
    }
}

impl fmt::Display for SymExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cst { value, .. } => write!(f, "{value:#x}"),
            Self::Var { name, .. } => f.write_str(name),
            Self::ZeroExt { bits, inner } => write!(f, "zext{bits}({inner})"),
            Self::SignExt { bits, inner } => write!(f, "sext{bits}({inner})"),
        }
    }
}

/// Transaction input data as a list of byte-aligned expressions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub(crate) struct CallData {
    parts: Vec<SymExpr>,
}

impl CallData {
    pub(crate) fn new(parts: Vec<SymExpr>) -> Self {
        debug_assert!(parts.iter().all(|p| p.bits() % 8 == 0));
        Self { parts }
    }

    pub(crate) fn len_bytes(&self) -> usize {
        self.parts.iter().map(|p| p.bits() as usize / 8).sum()
    }

    pub(crate) fn symbolic_vars(&self) -> usize {
        fn count(expr: &SymExpr) -> usize {
            match expr {
                SymExpr::Cst { .. } => 0,
                SymExpr::Var { .. } => 1,
                SymExpr::ZeroExt { inner, .. } | SymExpr::SignExt { inner, .. } => count(inner),
            }
        }
        self.parts.iter().map(count).sum()
    }

    pub(crate) fn concretize(&self, ctx: &VarContext) -> Option<Vec<u8>> {
        let mut out = Vec::with_capacity(self.len_bytes());
        for part in &self.parts {
            let width = part.bits() as usize / 8;
            let bytes = part.eval(ctx)?.to_bytes_be();
            let bytes = if bytes == [0] { Vec::new() } else { bytes };
            out.extend(std::iter::repeat_n(0u8, width - bytes.len()));
            out.extend(bytes);
        }
        Some(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct EvmTransaction {
    pub origin: SymExpr,
    pub sender: SymExpr,
    #[serde(serialize_with = "ser_biguint")]
    pub recipient: BigUint,
    pub value: SymExpr,
    pub data: CallData,
    pub gas_price: SymExpr,
    pub gas_limit: SymExpr,
}

/// One transaction of a sequence in the symbolic engine's representation.
/// `tx` is `None` for pure time/block advances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct AbstractTx {
    pub tx: Option<EvmTransaction>,
    pub block_num_inc: SymExpr,
    pub block_timestamp_inc: SymExpr,
    pub ctx: VarContext,
}

impl fmt::Display for AbstractTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tx {
            None => writeln!(f, "no call")?,
            Some(tx) => {
                writeln!(f, "sender:    {}", tx.sender)?;
                writeln!(f, "recipient: {:#x}", tx.recipient)?;
                let kind = if tx.value.is_concrete() { "" } else { " (symbolic)" };
                writeln!(f, "value:     {}{kind}", tx.value)?;
                writeln!(
                    f,
                    "data:      {} bytes, {} symbolic",
                    tx.data.len_bytes(),
                    tx.data.symbolic_vars()
                )?;
                writeln!(f, "gas:       {} @ {}", tx.gas_limit, tx.gas_price)?;
            }
        }
        writeln!(f, "block inc: {}", self.block_num_inc)?;
        write!(f, "time inc:  {}", self.block_timestamp_inc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_path_names() {
        let arg = VarPath::new("tx3", TxField::Arg(1));
        assert_eq!(arg.name(), "tx3_arg1");
        assert_eq!(arg.index(0).index(12).name(), "tx3_arg1_0_12");
        assert_eq!(
            VarPath::new("tx0", TxField::BlockTimestampInc).name(),
            "tx0_block_timestamp_inc"
        );
    }

    #[test]
    fn test_contains_under_respects_boundaries() {
        let mut ctx = VarContext::new();
        ctx.set_name("tx1_arg10_2".to_owned(), &BigUint::from(1u32), 8);
        assert!(!ctx.contains_under(&VarPath::new("tx1", TxField::Arg(1))));
        assert!(ctx.contains_under(&VarPath::new("tx1", TxField::Arg(10))));
        ctx.set_name("tx1_arg1_0".to_owned(), &BigUint::from(1u32), 8);
        assert!(ctx.contains_under(&VarPath::new("tx1", TxField::Arg(1))));
    }

    #[test]
    fn test_sign_ext_eval() {
        let mut ctx = VarContext::new();
        let path = VarPath::new("tx0", TxField::Arg(0));
        let e = SymExpr::var(&mut ctx, &path, 8, &BigUint::from(0xfeu32)).sign_ext(16);
        assert_eq!(e.eval(&ctx), Some(BigUint::from(0xfffeu32)));
        let e = SymExpr::cst(8, 0x7fu32).sign_ext(16);
        assert_eq!(e.eval(&ctx), Some(BigUint::from(0x7fu32)));
    }

    #[test]
    fn test_assignment_json() {
        let ctx = VarContext::from_assignment_json(
            r#"{"tx0_sender": "0x10", "tx0_arg0": "42", "tx0_value": 7, "tx0_arg1": null}"#,
        )
        .unwrap()
        .unwrap();
        let get = |name| ctx.get_name(name).cloned();
        assert_eq!(get("tx0_sender"), Some(BigUint::from(16u32)));
        assert_eq!(get("tx0_arg0"), Some(BigUint::from(42u32)));
        assert_eq!(get("tx0_value"), Some(BigUint::from(7u32)));
        assert_eq!(get("tx0_arg1"), None);
        assert!(VarContext::from_assignment_json("null").unwrap().is_none());
        assert!(VarContext::from_assignment_json("[1]").is_err());
    }
}
