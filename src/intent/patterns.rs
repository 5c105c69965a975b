//! Keyword tables for intent detection.
//!
//! Two buckets: `general` (chit-chat the model answers on its own) and `rag`
//! (questions about the uploaded documents). Each category is a list of regex
//! fragments searched in the lowercased message, plus a weight.

use crate::error::{RagchatError, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    pub weight: f32,
    pub patterns: Vec<String>,
}

/// Both buckets, in evaluation order
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IntentTables {
    pub general: Vec<CategorySpec>,
    pub rag: Vec<CategorySpec>,
}

fn category(name: &str, weight: f32, patterns: &[&str]) -> CategorySpec {
    CategorySpec {
        name: name.to_string(),
        weight,
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
    }
}

impl IntentTables {
    /// Spanish tables the assistant ships with
    pub fn builtin() -> Self {
        IntentTables {
            general: vec![
                category(
                    "greeting",
                    1.0,
                    &["hola", "hello", "hi", "hey", "buenos días", "buenas tardes", "buenas noches", "qué tal", "cómo estás"],
                ),
                category(
                    "farewell",
                    1.0,
                    &["adiós", "bye", "chao", "hasta luego", "nos vemos", "que tengas buen día", "gracias", "thanks"],
                ),
                category(
                    "identity",
                    0.9,
                    &["quién eres", "cuál es tu nombre", "qué eres", "qué puedes hacer", "tu función"],
                ),
                category(
                    "small_talk",
                    0.8,
                    &["cómo estás", "qué opinas", "cuéntame un chiste", "qué tiempo hace", "hablamos", "conversemos"],
                ),
                category(
                    "help",
                    0.9,
                    &["ayuda", "help", "qué puedes hacer", "funciones", "cómo usar", "instrucciones"],
                ),
            ],
            rag: vec![
                category(
                    "document_query",
                    0.95,
                    &[
                        "documento", "archivo", "pdf", "informe", "reporte", "según.*documento", "en el.*archivo",
                        "en el.*pdf", "contiene.*documento", "menciona.*archivo",
                    ],
                ),
                category(
                    "specific_content",
                    0.9,
                    &[
                        "procedimiento", "política", "protocolo", "guía", "manual", "especificación", "requisito",
                        "norma", "cláusula", "artículo", "contrato", "acuerdo",
                    ],
                ),
                category(
                    "data_query",
                    0.85,
                    &[
                        "datos", "estadística", "número", "cifra", "porcentaje", "gráfico", "tabla", "figura",
                        "resultado", "métrica", "indicador",
                    ],
                ),
                category(
                    "technical_query",
                    0.8,
                    &[
                        "cómo funciona", "paso a paso", "instrucciones", "método", "técnica", "proceso", "flujo",
                        "diagrama", "esquema", "metodología",
                    ],
                ),
                category(
                    "search_query",
                    0.75,
                    &[
                        "busca", "encuentra", "localiza", "dónde está", "qué dice sobre", "información sobre",
                        "detalles de", "explicación de",
                    ],
                ),
            ],
        }
    }

    /// Read replacement tables from a TOML file with `[[general]]` and `[[rag]]` entries
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let tables: IntentTables = toml::from_str(&raw)
            .map_err(|e| RagchatError::Config(format!("Invalid intent patterns {}: {}", path.display(), e)))?;
        tables.validate()?;
        Ok(tables)
    }

    fn validate(&self) -> Result<()> {
        for (bucket, categories) in [("general", &self.general), ("rag", &self.rag)] {
            for c in categories {
                if !(c.weight.is_finite() && c.weight >= 0.0) {
                    return Err(RagchatError::Config(format!(
                        "Intent category {}.{} has invalid weight {}",
                        bucket, c.name, c.weight
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_weights() {
        let tables = IntentTables::builtin();
        let general: f32 = tables.general.iter().map(|c| c.weight).sum();
        let rag: f32 = tables.rag.iter().map(|c| c.weight).sum();
        assert!((general - 4.6).abs() < 1e-5);
        assert!((rag - 4.25).abs() < 1e-5);
        assert_eq!(tables.general[0].name, "greeting");
        assert_eq!(tables.rag[0].name, "document_query");
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("intents.toml");
        fs::write(
            &path,
            r#"
[[general]]
name = "greeting"
weight = 1.0
patterns = ["hello"]

[[rag]]
name = "docs"
weight = 2.0
patterns = ["manual", "report"]
"#,
        )
        .unwrap();

        let tables = IntentTables::from_file(&path).unwrap();
        assert_eq!(tables.general.len(), 1);
        assert_eq!(tables.rag[0].patterns, vec!["manual", "report"]);
    }

    #[test]
    fn test_negative_weight_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("intents.toml");
        fs::write(&path, "general = []\n[[rag]]\nname = \"x\"\nweight = -1.0\npatterns = []\n").unwrap();
        assert!(IntentTables::from_file(&path).is_err());
    }
}
