//! Signed value transfers

use crate::chain::SignedTransfer;
use crate::error::{FaucetError, FaucetResult};

use ethers::signers::{LocalWallet, Signer as _};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionRequest, H256, U256};
use ethers::utils::keccak256;

/// Build and sign a legacy value transfer
pub async fn sign_transfer(
    wallet: &LocalWallet,
    chain_id: u64,
    to: Address,
    value: U256,
    nonce: U256,
    gas_limit: U256,
    gas_price: U256,
) -> FaucetResult<SignedTransfer> {
    let from = wallet.address();
    let tx: TypedTransaction = TransactionRequest::new()
        .from(from)
        .to(to)
        .value(value)
        .nonce(nonce)
        .gas(gas_limit)
        .gas_price(gas_price)
        .chain_id(chain_id)
        .into();

    let signature = wallet
        .sign_transaction(&tx)
        .await
        .map_err(|e| FaucetError::Signing(e.to_string()))?;
    let raw = tx.rlp_signed(&signature);
    let hash = H256::from(keccak256(&raw));

    Ok(SignedTransfer {
        from,
        to,
        value,
        nonce,
        gas_limit,
        gas_price,
        hash,
        raw,
    })
}
