//! In-memory corpus loaded from files and inline documents

use super::search::{search_with_excerpt_limit, DEFAULT_EXCERPT_CHARS};
use super::{Document, KnowledgeError, KnowledgeSource, Match};
use crate::config::KnowledgeSection;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SECTION_HEADING: &str = "### ";

/// Immutable document set shared by every request
#[derive(Debug, Clone)]
pub struct Corpus {
    documents: Vec<Document>,
    max_excerpt_chars: usize,
}

impl Default for Corpus {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Corpus {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            max_excerpt_chars: DEFAULT_EXCERPT_CHARS,
        }
    }

    pub fn with_excerpt_limit(mut self, max_excerpt_chars: usize) -> Self {
        self.max_excerpt_chars = max_excerpt_chars.max(1);
        self
    }

    /// Load every configured path, then append inline documents.
    ///
    /// Directories are read non-recursively in file-name order so the
    /// insertion order, and therefore tie-breaking, is reproducible.
    pub async fn load(section: &KnowledgeSection) -> Result<Self, KnowledgeError> {
        let mut documents = Vec::new();

        for path in &section.paths {
            let metadata = tokio::fs::metadata(path)
                .await
                .map_err(|e| read_error(path, e))?;

            if metadata.is_dir() {
                for file in list_dir(path).await? {
                    documents.extend(load_file(&file).await?);
                }
            } else {
                documents.extend(load_file(path).await?);
            }
        }

        for inline in &section.documents {
            documents.push(Document {
                id: inline.id.clone(),
                title: inline.title.clone(),
                text: inline.text.clone(),
            });
        }

        info!(documents = documents.len(), "Knowledge corpus loaded");
        Ok(Self::new(documents).with_excerpt_limit(section.max_excerpt_chars))
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Synchronous search over the loaded documents
    pub fn find(&self, query: &str, max_results: usize) -> Vec<Match> {
        search_with_excerpt_limit(&self.documents, query, max_results, self.max_excerpt_chars)
    }
}

#[async_trait]
impl KnowledgeSource for Corpus {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Match>, KnowledgeError> {
        Ok(self.find(query, max_results))
    }

    fn len(&self) -> usize {
        self.documents.len()
    }
}

async fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, KnowledgeError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| read_error(dir, e))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| read_error(dir, e))? {
        let path = entry.path();
        if path.is_file() && is_supported(&path) {
            files.push(path);
        } else {
            debug!(path = %path.display(), "Skipping non-document entry");
        }
    }
    files.sort();
    Ok(files)
}

fn is_supported(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("md") | Some("markdown") | Some("txt")
    )
}

async fn load_file(path: &Path) -> Result<Vec<Document>, KnowledgeError> {
    if !is_supported(path) {
        warn!(path = %path.display(), "Unsupported knowledge file type, skipping");
        return Ok(Vec::new());
    }

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| read_error(path, e))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let documents = if path.extension().and_then(|e| e.to_str()) == Some("txt") {
        if content.trim().is_empty() {
            Vec::new()
        } else {
            vec![Document::new(name, content.trim())]
        }
    } else {
        split_markdown(&name, &content)
    };

    debug!(path = %path.display(), sections = documents.len(), "Loaded knowledge file");
    Ok(documents)
}

/// Split markdown on `### ` headings; each section becomes one document.
///
/// Text before the first heading is kept as its own untitled section.
/// Sections are numbered from 1 in file order: `<file>#<n>`.
pub fn split_markdown(name: &str, content: &str) -> Vec<Document> {
    let mut sections: Vec<(Option<String>, String)> = Vec::new();
    let mut title: Option<String> = None;
    let mut body = String::new();

    for line in content.lines() {
        if let Some(heading) = line.strip_prefix(SECTION_HEADING) {
            sections.push((title.take(), std::mem::take(&mut body)));
            title = Some(heading.trim().to_string());
        }
        body.push_str(line);
        body.push('\n');
    }
    sections.push((title, body));

    sections
        .into_iter()
        .filter(|(_, text)| !text.trim().is_empty())
        .enumerate()
        .map(|(n, (title, text))| Document {
            id: format!("{name}#{}", n + 1),
            title,
            text: text.trim().to_string(),
        })
        .collect()
}

fn read_error(path: &Path, source: std::io::Error) -> KnowledgeError {
    KnowledgeError::Read {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InlineDocument;

    const FAQ: &str = "# IT FAQ\n\nGeneral notes.\n\n### VPN\nUse the corporate VPN client.\n\n### Printer\nTray 2 jams often.\n";

    #[test]
    fn test_split_markdown_sections() {
        let docs = split_markdown("faq.md", FAQ);
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].id, "faq.md#1");
        assert!(docs[0].title.is_none());
        assert_eq!(docs[1].id, "faq.md#2");
        assert_eq!(docs[1].title.as_deref(), Some("VPN"));
        assert!(docs[1].text.starts_with("### VPN"));
        assert_eq!(docs[2].title.as_deref(), Some("Printer"));
    }

    #[test]
    fn test_split_markdown_without_preamble() {
        let docs = split_markdown("kb.md", "### Only\nbody text");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "kb.md#1");
    }

    #[tokio::test]
    async fn test_load_directory_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "printer toner").unwrap();
        std::fs::write(dir.path().join("a.md"), FAQ).unwrap();
        std::fs::write(dir.path().join("ignored.csv"), "x,y").unwrap();

        let section = KnowledgeSection {
            paths: vec![dir.path().to_path_buf()],
            max_excerpt_chars: 800,
            documents: vec![InlineDocument {
                id: "inline".to_string(),
                title: None,
                text: "printer drivers".to_string(),
            }],
        };

        let corpus = Corpus::load(&section).await.unwrap();
        let ids: Vec<&str> = corpus.documents().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a.md#1", "a.md#2", "a.md#3", "b.txt", "inline"]);

        let matches = corpus.search("printer", 5).await.unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.document_id.as_str()).collect();
        assert_eq!(ids, vec!["a.md#3", "b.txt", "inline"]);
    }

    #[tokio::test]
    async fn test_missing_path_is_read_error() {
        let section = KnowledgeSection {
            paths: vec![PathBuf::from("/definitely/not/here")],
            ..KnowledgeSection::default()
        };
        assert!(matches!(
            Corpus::load(&section).await,
            Err(KnowledgeError::Read { .. })
        ));
    }
}
