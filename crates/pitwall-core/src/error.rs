use thiserror::Error;

/// Erros comuns da biblioteca Pitwall
#[derive(Error, Debug)]
pub enum Error {
    /// Erro de comunicação com o node Ethereum
    #[error("Erro de RPC: {0}")]
    RpcError(String),

    /// Calldata com seletor reconhecido mas parâmetros malformados
    #[error("Erro de decodificação: {0}")]
    DecodeError(String),

    /// Erro de codificação de dados
    #[error("Erro de codificação: {0}")]
    EncodeError(String),

    /// Erro de validação
    #[error("Erro de validação: {0}")]
    ValidationError(String),

    /// Erro de timeout
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Recurso não encontrado
    #[error("Não encontrado: {0}")]
    NotFound(String),

    /// A inscrição no feed de transações pendentes caiu
    #[error("Erro de inscrição: {0}")]
    SubscriptionError(String),

    /// Falha ao enviar uma transação assinada
    #[error("Erro de envio: {0}")]
    SubmissionError(String),

    /// Erro devolvido pelo relay privado
    #[error("{0}")]
    RelayError(String),

    /// Configuração ausente ou inválida
    #[error("Erro de configuração: {0}")]
    ConfigError(String),

    /// Erro genérico
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Indica se o erro é local ao item processado (o watcher segue em frente)
    pub fn is_transient(&self) -> bool {
        !matches!(self, Error::SubscriptionError(_) | Error::ConfigError(_))
    }
}

/// Tipo de resultado usado em toda a biblioteca
pub type Result<T> = std::result::Result<T, Error>;
