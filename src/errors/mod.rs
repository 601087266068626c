//! # Módulo de Erros
//!
//! Define a taxonomia de erros da biblioteca e os códigos estruturados
//! usados nos logs.
//!
//! ## Para todos entenderem:
//!
//! Existem três famílias de problemas, e cada uma é tratada de um jeito:
//!
//! | Família       | Quando aparece                          | O que acontece        |
//! |---------------|-----------------------------------------|-----------------------|
//! | Configuração  | Teste montado errado (sem URL, schema)  | Falha imediata        |
//! | Assertion     | A resposta não é a esperada             | Só no `assert*()`     |
//! | Transporte    | Rede, DNS, timeout na chamada principal | Propaga para quem chamou |
//!
//! Falhas de uma iteração de carga e falhas dentro de um predicado nunca
//! viram erro: elas são contabilizadas (status `-1`) ou registradas como
//! `false` no ledger.
//!
//! ## Categorias de código
//!
//! | Faixa  | Categoria     |
//! |--------|---------------|
//! | E1xxx  | Configuração  |
//! | E2xxx  | Transporte    |
//! | E3xxx  | Assertion     |
//! | E5xxx  | Interno       |

use std::fmt;
use thiserror::Error;

/// Resultado padrão da biblioteca.
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// CÓDIGO DE ERRO
// ============================================================================

/// Código de erro estruturado: primeiro dígito é a categoria,
/// os três últimos identificam o erro.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(u16);

impl ErrorCode {
    // ========================================================================
    // E1xxx: Configuração
    // ========================================================================

    /// Nem URL explícita nem host foram informados.
    pub const MISSING_URL: Self = Self(1001);

    /// URL (ou host + path) não pôde ser interpretada como absoluta.
    pub const INVALID_URL: Self = Self(1002);

    /// Texto de JSON schema malformado.
    pub const INVALID_SCHEMA: Self = Self(1003);

    /// Nome de assertion registrado duas vezes.
    pub const DUPLICATE_ASSERTION: Self = Self(1004);

    /// Content-Type da resposta sem parser correspondente.
    pub const UNSUPPORTED_CONTENT_TYPE: Self = Self(1005);

    /// Body declarado como JSON/XML (ou custom) que não parseia.
    pub const UNPARSEABLE_BODY: Self = Self(1006);

    /// Objeto de body que não serializa para JSON.
    pub const BODY_SERIALIZATION: Self = Self(1007);

    /// Anexo com content-type inválido.
    pub const INVALID_FILE_PART: Self = Self(1008);

    // ========================================================================
    // E2xxx: Transporte
    // ========================================================================

    /// Timeout na chamada HTTP.
    pub const HTTP_TIMEOUT: Self = Self(2001);

    /// Erro de conexão (DNS, recusa, rede).
    pub const HTTP_CONNECTION_ERROR: Self = Self(2002);

    /// Falha ao ler o corpo da resposta.
    pub const HTTP_BODY_ERROR: Self = Self(2003);

    /// Qualquer outra falha do cliente HTTP.
    pub const HTTP_OTHER: Self = Self(2004);

    // ========================================================================
    // E3xxx: Assertions
    // ========================================================================

    /// Assertion nomeada avaliou `false`.
    pub const ASSERTION_FAILED: Self = Self(3001);

    /// Documento não passou na validação de schema.
    pub const ASSERTION_SCHEMA: Self = Self(3002);

    // ========================================================================
    // E5xxx: Internos
    // ========================================================================

    /// Erro interno inesperado.
    pub const INTERNAL_ERROR: Self = Self(5001);

    /// Retorna o código numérico.
    pub fn code(&self) -> u16 {
        self.0
    }

    /// Retorna o código formatado com prefixo "E", ex: `E1001`.
    pub fn formatted(&self) -> String {
        format!("E{:04}", self.0)
    }

    /// Categoria derivada do primeiro dígito.
    pub fn category(&self) -> ErrorCategory {
        match self.0 / 1000 {
            1 => ErrorCategory::Configuration,
            2 => ErrorCategory::Transport,
            3 => ErrorCategory::Assertion,
            5 => ErrorCategory::Internal,
            _ => ErrorCategory::Unknown,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted())
    }
}

/// Categoria de erro baseada no primeiro dígito do código.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Transport,
    Assertion,
    Internal,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuração"),
            Self::Transport => write!(f, "Transporte"),
            Self::Assertion => write!(f, "Assertion"),
            Self::Internal => write!(f, "Interno"),
            Self::Unknown => write!(f, "Desconhecido"),
        }
    }
}

// ============================================================================
// TIPOS DE ERRO
// ============================================================================

/// Erro de configuração: o teste foi montado de forma incorreta.
/// Sempre propaga imediatamente.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("url must be provided")]
    MissingUrl,

    #[error("url '{url}' is not valid: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("schema is not valid: {reason}")]
    InvalidSchema { reason: String },

    #[error("rule for ({name}) already exist")]
    DuplicateAssertion { name: String },

    #[error("({content_type}) not supported")]
    UnsupportedContentType { content_type: String },

    #[error("body declared as ({content_type}) could not be parsed: {reason}")]
    UnparseableBody { content_type: String, reason: String },

    #[error("body could not be serialized to json: {reason}")]
    BodySerialization { reason: String },

    #[error("file '{file_name}' has an invalid content-type '{content_type}'")]
    InvalidFilePart { file_name: String, content_type: String },
}

/// Falha de assertion, levantada apenas quando o chamador pede
/// (`assert`, `assert_schema`, `assert_all`).
#[derive(Debug, Error)]
pub enum AssertionError {
    #[error("({name}) Test Failed")]
    Failed { name: String },

    #[error("Schema Check Failed")]
    Schema { errors: Vec<String> },
}

/// Classificação de uma falha do cliente HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Body,
    Other,
}

/// Falha de rede na chamada principal. Nunca é convertida em resultado
/// de assertion.
#[derive(Debug, Error)]
#[error("request to {url} failed: {message}")]
pub struct TransportError {
    pub url: String,
    pub message: String,
    pub kind: TransportErrorKind,
}

impl TransportError {
    pub fn new(url: impl Into<String>, kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            message: message.into(),
            kind,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self.kind {
            TransportErrorKind::Timeout => ErrorCode::HTTP_TIMEOUT,
            TransportErrorKind::Connect => ErrorCode::HTTP_CONNECTION_ERROR,
            TransportErrorKind::Body => ErrorCode::HTTP_BODY_ERROR,
            TransportErrorKind::Other => ErrorCode::HTTP_OTHER,
        }
    }
}

impl ConfigError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingUrl => ErrorCode::MISSING_URL,
            Self::InvalidUrl { .. } => ErrorCode::INVALID_URL,
            Self::InvalidSchema { .. } => ErrorCode::INVALID_SCHEMA,
            Self::DuplicateAssertion { .. } => ErrorCode::DUPLICATE_ASSERTION,
            Self::UnsupportedContentType { .. } => ErrorCode::UNSUPPORTED_CONTENT_TYPE,
            Self::UnparseableBody { .. } => ErrorCode::UNPARSEABLE_BODY,
            Self::BodySerialization { .. } => ErrorCode::BODY_SERIALIZATION,
            Self::InvalidFilePart { .. } => ErrorCode::INVALID_FILE_PART,
        }
    }
}

impl AssertionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Failed { .. } => ErrorCode::ASSERTION_FAILED,
            Self::Schema { .. } => ErrorCode::ASSERTION_SCHEMA,
        }
    }
}

/// Erro de topo da biblioteca.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Assertion(#[from] AssertionError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Error {
    /// Código estruturado do erro.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Config(e) => e.code(),
            Self::Assertion(e) => e.code(),
            Self::Transport(e) => e.code(),
        }
    }

    /// Mensagem com o código como prefixo, para logs.
    pub fn user_message(&self) -> String {
        format!("[{}] {}", self.code(), self)
    }

    pub fn is_assertion(&self) -> bool {
        matches!(self, Self::Assertion(_))
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
