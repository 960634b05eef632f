use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::{collapse_whitespace, i64_field, str_field, string_list};
use crate::models::{ArxivPaperRecord, DailyPaperRecord, ModelRecord, RecordKind};
use crate::xml::{XmlElement, ARXIV_NS, ATOM_NS};

/// Tags that name a model's library when `library_name` is absent.
pub const KNOWN_LIBRARIES: &[&str] = &[
    "transformers",
    "diffusers",
    "pytorch",
    "tensorflow",
    "jax",
    "onnx",
    "safetensors",
    "gguf",
    "spacy",
    "keras",
    "sklearn",
    "sentence-transformers",
    "peft",
    "adapter-transformers",
];

static ARXIV_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4}\.\d{4,5})").expect("valid arXiv id regex"));

/// Format one `/api/models` item.
pub fn format_model(data: &Value) -> ModelRecord {
    let model_id = data
        .get("modelId")
        .and_then(Value::as_str)
        .or_else(|| data.get("id").and_then(Value::as_str))
        .unwrap_or("")
        .to_string();
    let tags = string_list(data, "tags");

    let mut library = str_field(data, "library_name").to_string();
    if library.is_empty() {
        if let Some(tag) = tags.iter().find(|t| KNOWN_LIBRARIES.contains(&t.as_str())) {
            library = tag.clone();
        }
    }

    let (author, model_name) = match model_id.split_once('/') {
        Some((author, _)) => (
            author.to_string(),
            model_id.rsplit('/').next().unwrap_or_default().to_string(),
        ),
        None => (String::new(), model_id.clone()),
    };

    ModelRecord {
        kind: RecordKind::Model,
        author,
        model_name,
        pipeline_tag: str_field(data, "pipeline_tag").to_string(),
        library,
        downloads: i64_field(data, "downloads"),
        downloads_all_time: i64_field(data, "downloadsAllTime"),
        likes: i64_field(data, "likes"),
        trending: data
            .get("trendingScore")
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
        tags,
        last_modified: str_field(data, "lastModified").to_string(),
        created_at: str_field(data, "createdAt").to_string(),
        private: data.get("private").and_then(Value::as_bool).unwrap_or(false),
        gated: data.get("gated").cloned().unwrap_or(Value::Bool(false)),
        url: format!("https://huggingface.co/{}", model_id),
        model_id,
    }
}

/// Format one Atom `<entry>` from the arXiv query API.
pub fn format_arxiv_paper(entry: &XmlElement) -> ArxivPaperRecord {
    let arxiv_id = ARXIV_ID
        .captures(entry.child_text(ATOM_NS, "id"))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    let authors: Vec<String> = entry
        .children_named(ATOM_NS, "author")
        .map(|author| author.child_text(ATOM_NS, "name").to_string())
        .filter(|name| !name.is_empty())
        .collect();

    let categories: Vec<String> = entry
        .children_named(ATOM_NS, "category")
        .filter_map(|cat| cat.attr("term"))
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect();

    let primary_category = entry
        .child(ARXIV_NS, "primary_category")
        .and_then(|el| el.attr("term"))
        .unwrap_or("")
        .to_string();

    let mut pdf_url = String::new();
    let mut abs_url = String::new();
    for link in entry.children_named(ATOM_NS, "link") {
        let href = link.attr("href").unwrap_or("");
        if link.attr("title") == Some("pdf") || href.ends_with(".pdf") {
            pdf_url = href.to_string();
        } else if link.attr("type") == Some("text/html") || href.contains("/abs/") {
            abs_url = href.to_string();
        }
    }
    if abs_url.is_empty() {
        abs_url = format!("https://arxiv.org/abs/{}", arxiv_id);
    }

    ArxivPaperRecord {
        kind: RecordKind::Paper,
        source: "arxiv".to_string(),
        title: collapse_whitespace(entry.child_text(ATOM_NS, "title")),
        summary: collapse_whitespace(entry.child_text(ATOM_NS, "summary")),
        authors: authors.join(", "),
        author_list: authors,
        published_date: entry.child_text(ATOM_NS, "published").to_string(),
        updated_date: entry.child_text(ATOM_NS, "updated").to_string(),
        primary_category,
        categories: categories.join(", "),
        category_list: categories,
        comment: entry.child_text(ARXIV_NS, "comment").to_string(),
        pdf_url,
        url: abs_url,
        arxiv_id,
    }
}

/// Format one `/api/daily_papers` item.
pub fn format_daily_paper(data: &Value) -> DailyPaperRecord {
    let empty = Value::Null;
    let paper = data.get("paper").filter(|p| p.is_object()).unwrap_or(&empty);
    let arxiv_id = str_field(paper, "id").to_string();

    let authors: Vec<String> = paper
        .get("authors")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .map(|a| str_field(a, "name"))
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let upvotes = if paper.get("upvotes").is_some() {
        i64_field(paper, "upvotes")
    } else {
        i64_field(data, "upvotes")
    };

    let submitter = data.get("submittedBy").unwrap_or(&empty);
    let submitted_by = match str_field(submitter, "fullname") {
        "" => str_field(submitter, "user"),
        name => name,
    };

    let (pdf_url, url) = if arxiv_id.is_empty() {
        (String::new(), String::new())
    } else {
        (
            format!("https://arxiv.org/pdf/{}", arxiv_id),
            format!("https://huggingface.co/papers/{}", arxiv_id),
        )
    };

    DailyPaperRecord {
        kind: RecordKind::Paper,
        source: "huggingface_daily".to_string(),
        title: str_field(paper, "title").to_string(),
        summary: str_field(paper, "summary").to_string(),
        authors: authors.join(", "),
        author_list: authors,
        published_date: str_field(paper, "publishedAt").to_string(),
        upvotes,
        num_comments: i64_field(data, "numComments"),
        ai_summary: str_field(paper, "ai_summary").to_string(),
        ai_keywords: string_list(paper, "ai_keywords"),
        submitted_by: submitted_by.to_string(),
        media_url: str_field(data, "mediaUrl").to_string(),
        pdf_url,
        url,
        arxiv_id,
    }
}
