// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::error::AppError;
use alloy::network::Ethereum;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use url::Url;

/// Provider with nonce/gas fillers and the operator signer attached.
pub type WalletProvider = DynProvider<Ethereum>;

pub struct ConnectionFactory;

impl ConnectionFactory {
    pub fn wallet_http(rpc_url: &str, signer: PrivateKeySigner) -> Result<WalletProvider, AppError> {
        let url = parse_rpc_url(rpc_url)?;
        let provider = ProviderBuilder::new().wallet(signer).connect_http(url);
        Ok(provider.erased())
    }

    /// Fail fast when the endpoint is unreachable; returns the chain id.
    pub async fn preflight(provider: &WalletProvider) -> Result<u64, AppError> {
        provider
            .get_chain_id()
            .await
            .map_err(|e| AppError::Connection(format!("chain id probe failed: {e}")))
    }
}

fn parse_rpc_url(rpc_url: &str) -> Result<Url, AppError> {
    Url::parse(rpc_url.trim()).map_err(|e| AppError::Config(format!("Invalid RPC URL: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::B256;

    fn signer() -> PrivateKeySigner {
        PrivateKeySigner::from_bytes(&B256::repeat_byte(0x11)).expect("valid key")
    }

    #[test]
    fn rejects_malformed_urls() {
        assert!(matches!(
            ConnectionFactory::wallet_http("not a url", signer()),
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test]
    async fn builds_wallet_provider() {
        assert!(ConnectionFactory::wallet_http("http://127.0.0.1:8545", signer()).is_ok());
    }
}
