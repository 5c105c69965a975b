//! Prompt templates sent to the language model.

use crate::search::{MetadataHit, SearchResult};

pub const RAG_UNAVAILABLE_NOTICE: &str =
    "⚠️ El sistema RAG no está disponible actualmente. Respondiendo en modo simple.\n\n";

pub const APOLOGY: &str = "Lo siento, ocurrió un error. Por favor intenta nuevamente.";

pub const NO_FILTERED_RESULTS: &str = "No se encontró información relevante con los filtros aplicados.";

/// One retrieved chunk as it appears in the prompt
#[derive(Debug, Clone, PartialEq)]
pub struct ContextDoc {
    pub source_file: String,
    pub file_type: String,
    pub content: String,
}

impl From<SearchResult> for ContextDoc {
    fn from(r: SearchResult) -> Self {
        ContextDoc {
            source_file: r.source_file,
            file_type: r.file_type,
            content: r.content,
        }
    }
}

impl From<MetadataHit> for ContextDoc {
    fn from(h: MetadataHit) -> Self {
        ContextDoc {
            source_file: h.source_file,
            file_type: h.file_type,
            content: h.content,
        }
    }
}

/// Labeled blocks separated by blank lines; content cut to `char_budget` chars if set
pub fn build_context(docs: &[ContextDoc], char_budget: Option<usize>) -> String {
    docs.iter()
        .map(|doc| {
            let content = match char_budget {
                Some(budget) if doc.content.chars().count() > budget => {
                    let cut: String = doc.content.chars().take(budget).collect();
                    format!("{}...", cut)
                }
                _ => doc.content.clone(),
            };
            format!(
                "📄 Documento: {}\n📊 Tipo: {}\n📝 Contenido: {}",
                doc.source_file, doc.file_type, content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn rag_prompt(context: &str, question: &str) -> String {
    format!(
        "Basándote en el siguiente contexto de documentos, responde la pregunta de manera precisa.\n\n\
         {context}\n\n\
         Pregunta: {question}\n\n\
         Instrucciones:\n\
         1. Responde principalmente con la información del contexto\n\
         2. Si el contexto no contiene suficiente información, complementa con conocimiento general\n\
         3. Sé conciso pero informativo\n\
         4. Menciona las fuentes cuando sea relevante\n\n\
         Respuesta:"
    )
}

pub fn simple_prompt(question: &str) -> String {
    format!("Responde de forma breve y directa:\n\nPregunta: {question}\n\nRespuesta:")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(source: &str, content: &str) -> ContextDoc {
        ContextDoc {
            source_file: source.to_string(),
            file_type: "pdf".to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_context_blocks() {
        let context = build_context(&[doc("a.pdf", "uno"), doc("b.pdf", "dos")], None);
        assert_eq!(
            context,
            "📄 Documento: a.pdf\n📊 Tipo: pdf\n📝 Contenido: uno\n\n📄 Documento: b.pdf\n📊 Tipo: pdf\n📝 Contenido: dos"
        );
    }

    #[test]
    fn test_char_budget_counts_chars() {
        let context = build_context(&[doc("a.pdf", "áéíóúxyz")], Some(5));
        assert!(context.ends_with("📝 Contenido: áéíóú..."));
        let untouched = build_context(&[doc("a.pdf", "corto")], Some(5));
        assert!(untouched.ends_with("📝 Contenido: corto"));
    }

    #[test]
    fn test_rag_prompt_layout() {
        let prompt = rag_prompt("CTX", "¿qué?");
        assert!(prompt.starts_with("Basándote en el siguiente contexto de documentos"));
        assert!(prompt.contains("\n\nCTX\n\nPregunta: ¿qué?\n\nInstrucciones:\n1. "));
        assert!(prompt.ends_with("4. Menciona las fuentes cuando sea relevante\n\nRespuesta:"));
    }

    #[test]
    fn test_simple_prompt() {
        assert_eq!(
            simple_prompt("hola"),
            "Responde de forma breve y directa:\n\nPregunta: hola\n\nRespuesta:"
        );
    }
}
