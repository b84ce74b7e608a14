use serde::{Deserialize, Serialize};

use crate::abi::AbiValue;

/// One transaction of a fuzzer corpus entry. All numbers are hex strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct EchidnaTx {
    #[serde(rename = "_call")]
    pub call: TxCall,
    #[serde(rename = "_src")]
    pub src: String,
    #[serde(rename = "_dst")]
    pub dst: String,
    #[serde(rename = "_gas'")]
    pub gas: String,
    #[serde(rename = "_gasprice'")]
    pub gas_price: String,
    #[serde(rename = "_value")]
    pub value: String,
    /// (timestamp increment, block number increment)
    #[serde(rename = "_delay")]
    pub delay: (String, String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", content = "contents")]
pub(crate) enum TxCall {
    SolCall(String, Vec<AbiValue>),
    /// Only advances block number and time.
    NoCall,
}
