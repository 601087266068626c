//! # Parsers de Body
//!
//! Decide como o body da resposta vira um `serde_json::Value` navegável,
//! olhando o header `Content-Type`:
//!
//! 1. contém `json` → JSON (objeto, array ou valor)
//! 2. contém `xml`  → XML convertido para a mesma árvore de `Value`
//! 3. contém um token registrado (ex: `csv`) → parser customizado
//! 4. nenhum dos anteriores com body não vazio → erro de configuração
//!
//! Body vazio nunca é erro: o valor parseado fica ausente.
//!
//! ## Registro de parsers
//!
//! Existe um registro global (`ParserRegistry::global()`) e qualquer
//! `ExecutionContext` pode receber outro via `with_parsers(..)`.
//! Registre os parsers uma vez, no início da suíte.

use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

use crate::errors::ConfigError;

/// Custom body parser: body text in, navigable value out.
pub type ParseFn = Arc<dyn Fn(&str) -> anyhow::Result<Value> + Send + Sync>;

static GLOBAL_REGISTRY: Lazy<Arc<ParserRegistry>> = Lazy::new(|| Arc::new(ParserRegistry::new()));

/// Append-only mapping from a content-type token to a parse function.
#[derive(Default)]
pub struct ParserRegistry {
    parsers: RwLock<Vec<(String, ParseFn)>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used when none is injected.
    pub fn global() -> Arc<ParserRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Registers `parser` for Content-Type values containing `token`
    /// (case-insensitive). Earlier registrations win on overlap.
    pub fn register<F>(&self, token: impl Into<String>, parser: F)
    where
        F: Fn(&str) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let token = token.into().trim().to_lowercase();
        debug!(token = %token, "custom body parser registered");
        self.parsers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((token, Arc::new(parser)));
    }

    pub fn tokens(&self) -> Vec<String> {
        self.parsers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(token, _)| token.clone())
            .collect()
    }

    fn find(&self, content_type: &str) -> Option<(String, ParseFn)> {
        self.parsers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(token, _)| !token.is_empty() && content_type.contains(token.as_str()))
            .map(|(token, parser)| (token.clone(), Arc::clone(parser)))
    }

    /// Parses `body` according to `content_type`. `Ok(None)` for an empty body.
    pub fn parse(&self, content_type: &str, body: &str) -> Result<Option<Value>, ConfigError> {
        if body.is_empty() {
            return Ok(None);
        }

        let lowered = content_type.to_lowercase();
        let unparseable = |reason: String| ConfigError::UnparseableBody {
            content_type: content_type.to_string(),
            reason,
        };

        if lowered.contains("json") {
            return serde_json::from_str(body)
                .map(Some)
                .map_err(|e| unparseable(e.to_string()));
        }

        if lowered.contains("xml") {
            return xml_to_value(body).map(Some).map_err(unparseable);
        }

        if let Some((token, parser)) = self.find(&lowered) {
            debug!(token = %token, "custom body parser selected");
            return parser(body).map(Some).map_err(|e| unparseable(e.to_string()));
        }

        Err(ConfigError::UnsupportedContentType {
            content_type: content_type.to_string(),
        })
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("tokens", &self.tokens())
            .finish()
    }
}

/// XML document as `{ "<root>": element }`, where an element is an object
/// keyed by child tag (repeated tags become arrays), attributes under
/// `@name` and mixed text under `#text`. Text-only elements collapse to a
/// string and empty ones to `null`.
pub fn xml_to_value(text: &str) -> Result<Value, String> {
    let document = roxmltree::Document::parse(text).map_err(|e| e.to_string())?;
    let root = document.root_element();

    let mut map = Map::new();
    map.insert(root.tag_name().name().to_string(), element_to_value(root));
    Ok(Value::Object(map))
}

fn element_to_value(node: roxmltree::Node<'_, '_>) -> Value {
    let mut map = Map::new();
    let mut text = String::new();

    for attribute in node.attributes() {
        map.insert(
            format!("@{}", attribute.name()),
            Value::String(attribute.value().to_string()),
        );
    }

    for child in node.children() {
        if child.is_element() {
            let key = child.tag_name().name().to_string();
            let value = element_to_value(child);
            match map.get_mut(&key) {
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    map.insert(key, value);
                }
            }
        } else if child.is_text() {
            text.push_str(child.text().unwrap_or_default());
        }
    }

    let text = text.trim();
    match (map.is_empty(), text.is_empty()) {
        (true, true) => Value::Null,
        (true, false) => Value::String(text.to_string()),
        (false, empty) => {
            if !empty {
                map.insert("#text".to_string(), Value::String(text.to_string()));
            }
            Value::Object(map)
        }
    }
}
