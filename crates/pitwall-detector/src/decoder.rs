use ethers::abi::{AbiParser, Function, ParamType, Token};
use pitwall_core::{error::Result, DecodedSwap, Error};

/// Assinatura da única função de swap observada
pub const SWAP_EXACT_ETH_FOR_TOKENS: &str =
    "swapExactETHForTokens(uint256,address[],address,uint256)";

/// Resultado da decodificação de calldata
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    Swap(DecodedSwap),
    /// Seletor diferente ou calldata curta demais
    NoMatch,
}

/// Decodificador para funções com layout `(uint256, address[], address, uint256)`
#[derive(Debug, Clone)]
pub struct SwapDecoder {
    function: Function,
}

impl SwapDecoder {
    pub fn new(signature: &str) -> Result<Self> {
        let function = AbiParser::default()
            .parse_function(signature)
            .map_err(|e| Error::ValidationError(format!("assinatura inválida `{}`: {}", signature, e)))?;

        let kinds: Vec<ParamType> = function.inputs.iter().map(|p| p.kind.clone()).collect();
        let expected = [
            ParamType::Uint(256),
            ParamType::Array(Box::new(ParamType::Address)),
            ParamType::Address,
            ParamType::Uint(256),
        ];
        if kinds != expected {
            return Err(Error::ValidationError(format!(
                "layout de parâmetros não suportado: {}",
                signature
            )));
        }

        Ok(Self { function })
    }

    /// Decodificador para `swapExactETHForTokens`
    pub fn swap_exact_eth_for_tokens() -> Result<Self> {
        Self::new(SWAP_EXACT_ETH_FOR_TOKENS)
    }

    pub fn selector(&self) -> [u8; 4] {
        self.function.short_signature()
    }

    /// Decodifica a calldata.
    ///
    /// Seletor diferente nunca é erro; seletor correto com parâmetros malformados
    /// retorna `DecodeError`.
    pub fn decode(&self, calldata: &[u8]) -> Result<DecodeOutcome> {
        if calldata.len() < 4 || calldata[..4] != self.selector() {
            return Ok(DecodeOutcome::NoMatch);
        }

        let tokens = self
            .function
            .decode_input(&calldata[4..])
            .map_err(|e| Error::DecodeError(format!("{}: {}", self.function.name, e)))?;

        match tokens.as_slice() {
            [Token::Uint(amount_out_min), Token::Array(path), Token::Address(recipient), Token::Uint(deadline)] => {
                let path = path
                    .iter()
                    .map(|token| match token {
                        Token::Address(address) => Ok(*address),
                        other => Err(Error::DecodeError(format!("item de path inesperado: {:?}", other))),
                    })
                    .collect::<Result<Vec<_>>>()?;

                Ok(DecodeOutcome::Swap(DecodedSwap {
                    amount_out_min: *amount_out_min,
                    path,
                    recipient: *recipient,
                    deadline: *deadline,
                }))
            }
            other => Err(Error::DecodeError(format!(
                "{}: {} parâmetros decodificados",
                self.function.name,
                other.len()
            ))),
        }
    }

    /// Codifica a chamada com seletor
    pub fn encode(&self, swap: &DecodedSwap) -> Result<Vec<u8>> {
        let path = swap.path.iter().copied().map(Token::Address).collect();
        self.function
            .encode_input(&[
                Token::Uint(swap.amount_out_min),
                Token::Array(path),
                Token::Address(swap.recipient),
                Token::Uint(swap.deadline),
            ])
            .map_err(|e| Error::EncodeError(format!("{}: {}", self.function.name, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethereum_types::{Address, U256};
    use proptest::prelude::*;

    fn decoder() -> SwapDecoder {
        SwapDecoder::swap_exact_eth_for_tokens().unwrap()
    }

    fn swap() -> DecodedSwap {
        DecodedSwap {
            amount_out_min: U256::from(1u64),
            path: vec![Address::repeat_byte(0xff), Address::repeat_byte(0x43)],
            recipient: Address::repeat_byte(0x11),
            deadline: U256::from(1_700_000_600u64),
        }
    }

    #[test]
    fn selector_matches_router_abi() {
        assert_eq!(hex::encode(decoder().selector()), "7ff36ab5");
    }

    #[test]
    fn decodes_encoded_call() {
        let d = decoder();
        let data = d.encode(&swap()).unwrap();
        assert_eq!(d.decode(&data).unwrap(), DecodeOutcome::Swap(swap()));
    }

    #[test]
    fn short_or_foreign_calldata_is_no_match() {
        let d = decoder();
        assert_eq!(d.decode(&[]).unwrap(), DecodeOutcome::NoMatch);
        assert_eq!(d.decode(&[0x7f, 0xf3, 0x6a]).unwrap(), DecodeOutcome::NoMatch);
        // approve(address,uint256)
        assert_eq!(d.decode(&hex::decode("095ea7b3").unwrap()).unwrap(), DecodeOutcome::NoMatch);
    }

    #[test]
    fn truncated_parameters_are_decode_errors() {
        let d = decoder();
        let mut data = d.encode(&swap()).unwrap();
        data.truncate(40);
        assert!(matches!(d.decode(&data), Err(Error::DecodeError(_))));
    }

    #[test]
    fn rejects_other_layouts() {
        assert!(SwapDecoder::new("swapExactTokensForTokens(uint256,uint256,address[],address,uint256)").is_err());
        assert!(SwapDecoder::new("not a signature").is_err());
        // mesmo layout, outro nome
        assert!(SwapDecoder::new("swapExactETHForTokensSupportingFeeOnTransferTokens(uint256,address[],address,uint256)").is_ok());
    }

    proptest! {
        #[test]
        fn foreign_selector_never_matches(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let d = decoder();
            prop_assume!(data.len() < 4 || data[..4] != d.selector());
            prop_assert_eq!(d.decode(&data).unwrap(), DecodeOutcome::NoMatch);
        }

        #[test]
        fn matching_selector_never_panics(tail in proptest::collection::vec(any::<u8>(), 0..256)) {
            let d = decoder();
            let mut data = d.selector().to_vec();
            data.extend(tail);
            let _ = d.decode(&data);
        }
    }
}
