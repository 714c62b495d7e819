use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::{Action, Address, Amount, Call, SequenceId, Swap, SwapParams, SwapRequest};

/// Errors that can occur when reading call rows or writing swap rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open {path}: {source}")]
    Open { path: String, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized row type '{kind}'")]
    UnrecognizedType { line: usize, kind: String },

    #[error("line {line}: {kind} missing {field}")]
    MissingField {
        line: usize,
        kind: String,
        field: &'static str,
    },

    #[error("line {line}: signature is not hex: {source}")]
    Signature {
        line: usize,
        source: hex::FromHexError,
    },

    #[error("failed to write swaps: {0}")]
    Write(#[from] csv::Error),

    #[error("failed to flush swaps: {0}")]
    Flush(#[from] io::Error),
}

/// One row of the input file.
#[derive(Debug, Clone)]
pub enum Input {
    /// A call to apply to the pool
    Call(Call),
    /// Credit an account in the in-memory asset ledger
    Mint {
        asset: Address,
        account: Address,
        amount: Amount,
    },
    /// Let custody pull up to `amount` from `owner`
    Approve {
        asset: Address,
        owner: Address,
        amount: Amount,
    },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    caller: Address,
    #[serde(default)]
    swap: Option<SequenceId>,
    #[serde(default)]
    in_asset: Option<Address>,
    #[serde(default)]
    out_asset: Option<Address>,
    #[serde(default)]
    amount_in: Option<Amount>,
    #[serde(default)]
    amount_out: Option<Amount>,
    #[serde(default)]
    sender: Option<Address>,
    #[serde(default)]
    receiver: Option<Address>,
    #[serde(default)]
    signature: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    id: SequenceId,
    status: &'static str,
    in_asset: String,
    out_asset: String,
    amount_in: String,
    amount_out: String,
    sender: String,
    receiver: String,
}

fn require<T>(
    value: Option<T>,
    line: usize,
    kind: &str,
    field: &'static str,
) -> Result<T, CsvError> {
    value.ok_or_else(|| CsvError::MissingField {
        line,
        kind: kind.to_string(),
        field,
    })
}

impl InputRow {
    fn into_input(self, line: usize) -> Result<Input, CsvError> {
        let kind = self.r#type.as_str();
        let caller = self.caller;
        let call = |action: Action| -> Result<Input, CsvError> {
            Ok(Input::Call(Call::new(caller, action)))
        };

        match kind {
            "create" | "create_finalize" => {
                let signature = require(self.signature.as_deref(), line, kind, "signature")?;
                let signature = hex::decode(signature.trim_start_matches("0x"))
                    .map_err(|source| CsvError::Signature { line, source })?;
                let request = SwapRequest {
                    params: SwapParams {
                        in_asset: require(self.in_asset, line, kind, "in_asset")?,
                        out_asset: require(self.out_asset, line, kind, "out_asset")?,
                        amount_in: require(self.amount_in, line, kind, "amount_in")?,
                        amount_out: require(self.amount_out, line, kind, "amount_out")?,
                        sender: require(self.sender, line, kind, "sender")?,
                        receiver: require(self.receiver, line, kind, "receiver")?,
                    },
                    signature,
                };
                if kind == "create" {
                    call(Action::CreateSwap(request))
                } else {
                    call(Action::CreateAndFinalizeSwap(request))
                }
            }
            "finalize" => call(Action::FinalizeSwap(require(self.swap, line, kind, "swap")?)),
            "decline" => call(Action::DeclineSwap(require(self.swap, line, kind, "swap")?)),
            "allow_inbound" | "revoke_inbound" => call(Action::SetInboundToken {
                asset: require(self.in_asset, line, kind, "in_asset")?,
                supported: kind == "allow_inbound",
            }),
            "allow_outbound" | "revoke_outbound" => call(Action::SetOutboundToken {
                asset: require(self.out_asset, line, kind, "out_asset")?,
                supported: kind == "allow_outbound",
            }),
            "withdraw" => call(Action::Withdraw {
                asset: require(self.out_asset, line, kind, "out_asset")?,
                receiver: require(self.receiver, line, kind, "receiver")?,
                amount: require(self.amount_out, line, kind, "amount_out")?,
            }),
            "mint" => Ok(Input::Mint {
                asset: require(self.in_asset, line, kind, "in_asset")?,
                account: require(self.sender, line, kind, "sender")?,
                amount: require(self.amount_in, line, kind, "amount_in")?,
            }),
            "approve" => Ok(Input::Approve {
                asset: require(self.in_asset, line, kind, "in_asset")?,
                owner: require(self.sender, line, kind, "sender")?,
                amount: require(self.amount_in, line, kind, "amount_in")?,
            }),
            other => Err(CsvError::UnrecognizedType {
                line,
                kind: other.to_string(),
            }),
        }
    }
}

/// Read input rows from a csv file
pub fn read_inputs(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<Input, CsvError>>, CsvError> {
    let path = path.as_ref();
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.display().to_string(),
            source,
        })?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            row.into_input(line)
        }))
}

/// Write swaps in csv format
pub fn write_swaps<'a>(
    swaps: impl IntoIterator<Item = &'a Swap>,
    out: impl io::Write,
) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_writer(out);

    for swap in swaps {
        let row = OutputRow {
            id: swap.sequence_id,
            status: swap.status.as_str(),
            in_asset: swap.in_asset.to_string(),
            out_asset: swap.out_asset.to_string(),
            amount_in: swap.amount_in.to_string(),
            amount_out: swap.amount_out.to_string(),
            sender: swap.sender.to_string(),
            receiver: swap.receiver.to_string(),
        };
        writer.serialize(&row)?;
    }

    writer.flush()?;
    Ok(())
}
