/*!
 * Pitwall Utils
 *
 * Utilitários comuns usados em toda a workspace Pitwall
 */

use ethereum_types::{Address, H256, U256};
use std::str::FromStr;
use tiny_keccak::{Hasher, Keccak};

const GWEI_DECIMALS: i32 = 9;
const ETHER_DECIMALS: i32 = 18;

/// Converte uma string hexadecimal para Address
pub fn hex_to_address(hex: &str) -> Option<Address> {
    let hex_str = hex.trim();
    let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    if hex_str.len() != 40 {
        return None;
    }
    Address::from_str(hex_str).ok()
}

/// Converte uma string hexadecimal para bytes
pub fn hex_to_bytes(hex: &str) -> Option<Vec<u8>> {
    let hex_str = hex.trim();
    let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    hex::decode(hex_str).ok()
}

/// Formata um H256 para exibição
pub fn format_h256(hash: &H256) -> String {
    format!("0x{:x}", hash)
}

/// Calcula o hash Keccak-256 de dados
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut result = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut result);
    result
}

/// Converte um U256 em f64 (com perda de precisão acima de 2^53)
pub fn u256_to_f64(value: U256) -> f64 {
    value
        .0
        .iter()
        .rev()
        .fold(0.0, |acc, word| acc * 18_446_744_073_709_551_616.0 + *word as f64)
}

/// Valor em wei expresso em gwei
pub fn wei_to_gwei(value: U256) -> f64 {
    u256_to_f64(value) / 10f64.powi(GWEI_DECIMALS)
}

/// Valor em wei expresso em ether
pub fn wei_to_ether(value: U256) -> f64 {
    u256_to_f64(value) / 10f64.powi(ETHER_DECIMALS)
}

/// Converte gwei (possivelmente fracionário) para wei
pub fn gwei_to_wei(gwei: f64) -> U256 {
    if !gwei.is_finite() || gwei <= 0.0 {
        return U256::zero();
    }
    U256::from((gwei * 10f64.powi(GWEI_DECIMALS)).round() as u128)
}
