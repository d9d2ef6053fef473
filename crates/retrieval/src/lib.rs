mod chunking;
mod tokenize;

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use ballot_core::{KnowledgeDoc, RetrievedChunk};
use once_cell::sync::Lazy;
use regex::Regex;
use walkdir::WalkDir;

pub use chunking::chunk_document;
pub use tokenize::tokenize;

const MAX_CHUNK_CHARS: usize = 420;
const SNIPPET_CHARS: usize = 220;

const BUILTIN_DOCS: &[(&str, &str)] = &[
    (
        "voting_system.md",
        include_str!("../../../kb/voting_system.md"),
    ),
    ("faq.md", include_str!("../../../kb/faq.md")),
];

static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#\s+(.+)$").expect("valid heading regex"));

#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub chunk_id: String,
    pub doc_id: String,
    pub title: String,
    pub source_path: String,
    pub text: String,
    pub keywords: HashSet<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct KnowledgeStats {
    pub docs_loaded: usize,
    pub chunks_loaded: usize,
    pub builtin: bool,
}

#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    docs: Vec<KnowledgeDoc>,
    chunks: Vec<IndexedChunk>,
    builtin: bool,
}

impl KnowledgeBase {
    /// Voting-system knowledge compiled into the binary.
    pub fn builtin() -> Self {
        let docs = BUILTIN_DOCS
            .iter()
            .map(|(path, body)| make_doc(path, Path::new(path), body.to_string()))
            .collect();
        Self::from_docs(docs, true)
    }

    pub fn from_kb_dir(path: impl AsRef<Path>) -> Result<Self> {
        let docs = load_docs(path.as_ref())?;
        Ok(Self::from_docs(docs, false))
    }

    /// Loads `path` when it holds markdown documents, the built-in knowledge
    /// otherwise.
    pub fn from_kb_dir_or_builtin(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Ok(Self::builtin());
        }

        let loaded = Self::from_kb_dir(path)?;
        if loaded.docs.is_empty() {
            Ok(Self::builtin())
        } else {
            Ok(loaded)
        }
    }

    fn from_docs(docs: Vec<KnowledgeDoc>, builtin: bool) -> Self {
        let mut chunks = Vec::new();

        for doc in &docs {
            for (idx, chunk) in chunk_document(&doc.body, MAX_CHUNK_CHARS)
                .into_iter()
                .enumerate()
            {
                let keywords = tokenize(&chunk).into_iter().collect::<HashSet<_>>();
                chunks.push(IndexedChunk {
                    chunk_id: format!("{}::{}", doc.id, idx),
                    doc_id: doc.id.clone(),
                    title: doc.title.clone(),
                    source_path: doc.source_path.clone(),
                    text: chunk,
                    keywords,
                });
            }
        }

        Self {
            docs,
            chunks,
            builtin,
        }
    }

    pub fn stats(&self) -> KnowledgeStats {
        KnowledgeStats {
            docs_loaded: self.docs.len(),
            chunks_loaded: self.chunks.len(),
            builtin: self.builtin,
        }
    }

    pub fn search(&self, query: &str, top_k: usize) -> Vec<RetrievedChunk> {
        let query_tokens = tokenize(query).into_iter().collect::<HashSet<_>>();

        let mut scored = self
            .chunks
            .iter()
            .map(|chunk| (keyword_score(&query_tokens, &chunk.keywords), chunk))
            .filter(|(score, _)| *score > 0.0)
            .collect::<Vec<_>>();

        scored.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(Ordering::Equal));

        scored
            .into_iter()
            .take(top_k)
            .map(|(score, chunk)| RetrievedChunk {
                doc_id: chunk.doc_id.clone(),
                title: chunk.title.clone(),
                snippet: snippet(&chunk.text, SNIPPET_CHARS),
                score,
                source_path: chunk.source_path.clone(),
            })
            .collect()
    }

    pub fn list_docs(&self) -> &[KnowledgeDoc] {
        &self.docs
    }
}

fn load_docs(root: &Path) -> Result<Vec<KnowledgeDoc>> {
    let mut docs = Vec::new();

    let mut paths = WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().and_then(|ext| ext.to_str()) == Some("md"))
        .map(|entry| entry.into_path())
        .collect::<Vec<_>>();
    paths.sort();

    for path in paths {
        let body = std::fs::read_to_string(&path)
            .with_context(|| format!("failed reading knowledge document: {}", path.display()))?;

        let rel_path = path
            .strip_prefix(root)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| path.to_string_lossy().to_string());

        docs.push(make_doc(&rel_path, &path, body));
    }

    Ok(docs)
}

fn make_doc(rel_path: &str, path: &Path, body: String) -> KnowledgeDoc {
    let title = HEADING
        .captures(&body)
        .and_then(|captures| captures.get(1).map(|value| value.as_str().trim().to_string()))
        .unwrap_or_else(|| {
            path.file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("untitled")
                .replace(['-', '_'], " ")
        });

    KnowledgeDoc {
        id: rel_path.replace('/', "::"),
        title,
        source_path: rel_path.to_string(),
        body,
    }
}

fn keyword_score(query_tokens: &HashSet<String>, doc_tokens: &HashSet<String>) -> f32 {
    if query_tokens.is_empty() || doc_tokens.is_empty() {
        return 0.0;
    }

    let overlap = query_tokens
        .iter()
        .filter(|token| doc_tokens.contains(*token))
        .count() as f32;

    overlap / query_tokens.len() as f32
}

fn snippet(input: &str, max_chars: usize) -> String {
    let compact = input.split_whitespace().collect::<Vec<_>>().join(" ");
    if compact.chars().count() <= max_chars {
        compact
    } else {
        compact.chars().take(max_chars).collect::<String>() + "..."
    }
}
