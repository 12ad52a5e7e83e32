//! Envia um swap lento (5 gwei) de 0.001 ETH pelo router para o token alvo, para que o
//! watcher possa ser observado de ponta a ponta.
//!
//! Requer as mesmas variáveis do servidor mais `WETH_ADDRESS`.

use anyhow::{Context, Result};
use chrono::Utc;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Middleware, Provider, Ws};
use ethers::signers::Signer;
use ethers::types::TransactionRequest;
use pitwall_core::utils::{format_h256, gwei_to_wei, hex_to_address};
use pitwall_core::DecodedSwap;
use pitwall_detector::SwapDecoder;
use pitwall_rpc::signer::parse_wallet;
use pitwall_server::ServerConfig;
use std::sync::Arc;

const VICTIM_GAS_GWEI: f64 = 5.0;
const VICTIM_VALUE_WEI: u64 = 1_000_000_000_000_000;
const DEADLINE_SECS: u64 = 600;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env().context("configuração inválida")?;
    let weth = std::env::var("WETH_ADDRESS")
        .ok()
        .and_then(|v| hex_to_address(&v))
        .context("WETH_ADDRESS ausente ou inválido")?;

    let provider = Provider::<Ws>::connect(config.wss_url.as_str())
        .await
        .context("falha ao conectar ao node")?;
    let chain_id = provider.get_chainid().await?.as_u64();
    let wallet = parse_wallet(&config.private_key)?.with_chain_id(chain_id);
    let client = Arc::new(SignerMiddleware::new(provider, wallet));

    let decoder = SwapDecoder::swap_exact_eth_for_tokens()?;
    let data = decoder.encode(&DecodedSwap {
        amount_out_min: 0u64.into(),
        path: vec![weth, config.target_token],
        recipient: client.address(),
        deadline: (Utc::now().timestamp().max(0) as u64 + DEADLINE_SECS).into(),
    })?;

    let tx = TransactionRequest::new()
        .to(config.router)
        .value(VICTIM_VALUE_WEI)
        .gas_price(gwei_to_wei(VICTIM_GAS_GWEI))
        .gas(300_000u64)
        .data(data);

    println!("enviando swap de 0.001 ETH a {} gwei...", VICTIM_GAS_GWEI);
    let pending = client.send_transaction(tx, None).await?;
    println!("enviado: {}", format_h256(&pending.tx_hash()));

    match pending.await? {
        Some(receipt) => println!(
            "minerado no bloco {:?}, status {:?}",
            receipt.block_number, receipt.status
        ),
        None => println!("transação descartada pela rede"),
    }
    Ok(())
}
