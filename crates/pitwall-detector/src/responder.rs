use crate::decoder::{DecodeOutcome, SwapDecoder};
use chrono::Utc;
use ethereum_types::{Address, U256};
use ethers::types::{transaction::eip2718::TypedTransaction, TransactionRequest};
use pitwall_core::{
    error::Result,
    traits::TransactionSubmitter,
    utils::gwei_to_wei,
    DecodedSwap, Error, PendingTransaction, TransactionHash,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Parâmetros da transação concorrente
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    /// Acréscimo sobre o gas price da vítima
    pub gas_increment_gwei: f64,
    pub gas_limit: u64,
    /// Prazo do swap a partir de agora
    pub deadline_secs: u64,
    pub submit_timeout: Duration,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            gas_increment_gwei: 2.0,
            gas_limit: 300_000,
            deadline_secs: 600,
            submit_timeout: Duration::from_secs(15),
        }
    }
}

/// Envia um swap idêntico ao da vítima com gas price maior
pub struct FrontRunResponder {
    submitter: Arc<dyn TransactionSubmitter>,
    router: Address,
    decoder: SwapDecoder,
    config: ResponderConfig,
}

impl FrontRunResponder {
    pub fn new(
        submitter: Arc<dyn TransactionSubmitter>,
        router: Address,
        decoder: SwapDecoder,
        config: ResponderConfig,
    ) -> Self {
        Self {
            submitter,
            router,
            decoder,
            config,
        }
    }

    /// Conta que assina as respostas
    pub fn address(&self) -> Address {
        self.submitter.address()
    }

    /// Monta a transação concorrente: mesmo path e valor, sem saída mínima, tokens para a
    /// própria conta
    pub fn build(&self, victim: &PendingTransaction) -> Result<TypedTransaction> {
        let swap = match self.decoder.decode(&victim.input)? {
            DecodeOutcome::Swap(swap) => swap,
            DecodeOutcome::NoMatch => {
                return Err(Error::ValidationError(format!(
                    "transação {:?} não é um swap reconhecido",
                    victim.hash
                )))
            }
        };
        let victim_gas = victim.gas_price.ok_or_else(|| {
            Error::ValidationError(format!("transação {:?} sem gas price", victim.hash))
        })?;

        let deadline = Utc::now().timestamp().max(0) as u64 + self.config.deadline_secs;
        let data = self.decoder.encode(&DecodedSwap {
            amount_out_min: U256::zero(),
            path: swap.path,
            recipient: self.address(),
            deadline: U256::from(deadline),
        })?;

        let request = TransactionRequest::new()
            .to(self.router)
            .value(victim.value)
            .gas_price(victim_gas.saturating_add(gwei_to_wei(self.config.gas_increment_gwei)))
            .gas(self.config.gas_limit)
            .data(data);

        Ok(request.into())
    }

    /// Envia a transação concorrente e devolve o hash aceito pelo node
    pub async fn react(&self, victim: &PendingTransaction) -> Result<TransactionHash> {
        let tx = self.build(victim)?;
        let hash = tokio::time::timeout(self.config.submit_timeout, self.submitter.submit(tx))
            .await
            .map_err(|_| {
                Error::TimeoutError(format!("envio excedeu {:?}", self.config.submit_timeout))
            })??;
        info!(victim = ?victim.hash, tx = ?hash, "transação concorrente enviada");
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct RecordingSubmitter {
        sent: Mutex<Vec<TypedTransaction>>,
    }

    #[async_trait]
    impl TransactionSubmitter for RecordingSubmitter {
        fn address(&self) -> Address {
            Address::repeat_byte(0xaa)
        }

        async fn submit(&self, tx: TypedTransaction) -> Result<TransactionHash> {
            self.sent.lock().push(tx);
            Ok(TransactionHash::repeat_byte(0xbb))
        }
    }

    fn victim(decoder: &SwapDecoder) -> PendingTransaction {
        let input = decoder
            .encode(&DecodedSwap {
                amount_out_min: U256::from(5u64),
                path: vec![Address::repeat_byte(0xff), Address::repeat_byte(0x43)],
                recipient: Address::repeat_byte(0x01),
                deadline: U256::from(1u64),
            })
            .unwrap();
        PendingTransaction {
            hash: TransactionHash::repeat_byte(0x01),
            from: Address::repeat_byte(0x01),
            to: Some(Address::repeat_byte(0x7a)),
            input,
            value: U256::exp10(15),
            gas_price: Some(U256::from(12_000_000_000u64)),
        }
    }

    #[tokio::test]
    async fn replicates_swap_with_higher_gas() {
        let decoder = SwapDecoder::swap_exact_eth_for_tokens().unwrap();
        let submitter = Arc::new(RecordingSubmitter { sent: Mutex::new(vec![]) });
        let responder = FrontRunResponder::new(
            submitter.clone(),
            Address::repeat_byte(0x7a),
            decoder.clone(),
            ResponderConfig::default(),
        );
        let victim = victim(&decoder);

        let hash = responder.react(&victim).await.unwrap();
        assert_eq!(hash, TransactionHash::repeat_byte(0xbb));

        let sent = submitter.sent.lock();
        let tx = &sent[0];
        assert_eq!(tx.gas_price(), Some(U256::from(14_000_000_000u64)));
        assert_eq!(tx.gas(), Some(&U256::from(300_000u64)));
        assert_eq!(tx.value(), Some(&U256::exp10(15)));
        assert_eq!(tx.to_addr(), Some(&Address::repeat_byte(0x7a)));

        let data = tx.data().unwrap();
        let DecodeOutcome::Swap(swap) = decoder.decode(data).unwrap() else {
            panic!("expected swap calldata");
        };
        assert_eq!(swap.amount_out_min, U256::zero());
        assert_eq!(swap.recipient, Address::repeat_byte(0xaa));
        assert_eq!(swap.path, vec![Address::repeat_byte(0xff), Address::repeat_byte(0x43)]);
        assert!(swap.deadline > U256::from(Utc::now().timestamp() as u64));
    }

    #[tokio::test]
    async fn refuses_non_swap_input() {
        let decoder = SwapDecoder::swap_exact_eth_for_tokens().unwrap();
        let submitter = Arc::new(RecordingSubmitter { sent: Mutex::new(vec![]) });
        let responder = FrontRunResponder::new(
            submitter.clone(),
            Address::repeat_byte(0x7a),
            decoder.clone(),
            ResponderConfig::default(),
        );
        let mut tx = victim(&decoder);
        tx.input = vec![0x09, 0x5e, 0xa7, 0xb3];
        assert!(matches!(responder.react(&tx).await, Err(Error::ValidationError(_))));
        assert!(submitter.sent.lock().is_empty());
    }
}
