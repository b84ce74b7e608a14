//! Translation between fuzzer transactions and abstract transactions.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::{
    abi::{AbiValue, encode},
    echidna::{EchidnaTx, TxCall},
    error::Result,
    symbolic::{AbstractTx, EvmTransaction, SymExpr, TxField, VarContext, VarPath},
    util,
};

const WORD_BITS: u32 = 256;
const ADDRESS_BITS: u32 = 160;

/// Translate a fuzzer transaction into an abstract transaction whose
/// variables are all named after `tx_name` and seeded with the concrete
/// values, so an unsolved sequence replays exactly like the original.
pub(crate) fn load_tx(tx: &EchidnaTx, tx_name: &str) -> Result<AbstractTx> {
    let mut ctx = VarContext::new();
    let path = |field| VarPath::new(tx_name, field);

    let block_num_inc = SymExpr::var(
        &mut ctx,
        &path(TxField::BlockNumInc),
        WORD_BITS,
        &util::parse_hex_int(&tx.delay.1)?,
    );
    let block_timestamp_inc = SymExpr::var(
        &mut ctx,
        &path(TxField::BlockTimestampInc),
        WORD_BITS,
        &util::parse_hex_int(&tx.delay.0)?,
    );

    let (func_name, args) = match &tx.call {
        TxCall::NoCall => {
            return Ok(AbstractTx {
                tx: None,
                block_num_inc,
                block_timestamp_inc,
                ctx,
            });
        }
        TxCall::SolCall(func_name, args) => (func_name, args),
    };

    let args = args
        .iter()
        .map(AbiValue::translate)
        .collect::<Result<Vec<_>>>()?;
    let data = encode::function_call(func_name, &args, &mut ctx, tx_name)?;

    let sender = SymExpr::var(
        &mut ctx,
        &path(TxField::Sender),
        ADDRESS_BITS,
        &util::parse_hex_int(&tx.src)?,
    );

    // The fuzzer only sends value to payable functions; a symbolic value on
    // any other call would let the solver produce a transaction that reverts.
    let concrete_value = util::parse_hex_int(&tx.value)?;
    let value = if concrete_value.is_zero() {
        SymExpr::cst(WORD_BITS, BigUint::zero())
    } else {
        SymExpr::var(&mut ctx, &path(TxField::Value), WORD_BITS, &concrete_value)
    };

    let tx = EvmTransaction {
        origin: sender.clone(),
        sender,
        recipient: util::parse_hex_int(&tx.dst)?,
        value,
        data,
        gas_price: SymExpr::cst(WORD_BITS, util::parse_hex_int(&tx.gas_price)?),
        gas_limit: SymExpr::cst(WORD_BITS, util::parse_hex_int(&tx.gas)?),
    };
    Ok(AbstractTx {
        tx: Some(tx),
        block_num_inc,
        block_timestamp_inc,
        ctx,
    })
}

/// New fuzzer transaction with every field that `model` assigns replaced.
/// `tx_name` must match the name the transaction was loaded with.
pub(crate) fn update_tx(tx: &EchidnaTx, model: &VarContext, tx_name: &str) -> Result<EchidnaTx> {
    let path = |field| VarPath::new(tx_name, field);
    let mut new_tx = tx.clone();

    if let TxCall::SolCall(func_name, args) = &tx.call {
        let args = args
            .iter()
            .enumerate()
            .map(|(j, arg)| arg.update(&path(TxField::Arg(j)), model))
            .collect::<Result<Vec<_>>>()?;
        new_tx.call = TxCall::SolCall(func_name.clone(), args);
    }

    if let Some(val) = model.get(&path(TxField::BlockNumInc)) {
        new_tx.delay.1 = util::to_hex(val);
    }
    if let Some(val) = model.get(&path(TxField::BlockTimestampInc)) {
        new_tx.delay.0 = util::to_hex(val);
    }
    if let Some(val) = model.get(&path(TxField::Sender)) {
        new_tx.src = util::to_address(val);
    }
    if let Some(val) = model.get(&path(TxField::Value)) {
        new_tx.value = util::to_hex(val);
    }
    Ok(new_tx)
}
