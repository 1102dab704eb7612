//! BM25 relevance over a candidate set.
//!
//! Document frequencies and average length are computed over the documents
//! passed in, not the whole corpus, so scores are only comparable within one
//! call.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// Lowercased runs of ASCII letters, digits and underscores.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
        .collect()
}

/// Score every document against `query`. The result is aligned with `docs`.
///
/// Repeated query terms contribute once per occurrence. An empty query or an
/// empty candidate set yields an empty vector.
pub fn score(query: &str, docs: &[(i64, String)], params: Bm25Params) -> Vec<f64> {
    let terms = tokenize(query);
    if terms.is_empty() || docs.is_empty() {
        return Vec::new();
    }

    let doc_tokens: Vec<Vec<String>> = docs.iter().map(|(_, text)| tokenize(text)).collect();
    let n = docs.len() as f64;
    let total_len: usize = doc_tokens.iter().map(Vec::len).sum();
    let avgdl = match total_len as f64 / n {
        x if x > 0.0 => x,
        _ => 1.0,
    };

    let query_set: HashSet<&str> = terms.iter().map(String::as_str).collect();
    let mut df: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for tokens in &doc_tokens {
        let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
        for t in unique {
            if query_set.contains(t) {
                *df.entry(t).or_insert(0) += 1;
            }
        }
    }

    let mut scores = vec![0.0f64; docs.len()];
    for term in &terms {
        let n_q = df.get(term.as_str()).copied().unwrap_or(0);
        if n_q == 0 {
            continue;
        }
        let n_q = n_q as f64;
        let idf = ((n - n_q + 0.5) / (n_q + 0.5) + 1.0).ln();
        for (i, tokens) in doc_tokens.iter().enumerate() {
            let tf = tokens.iter().filter(|t| *t == term).count() as f64;
            let dl = tokens.len() as f64;
            let denom = tf + params.k1 * (1.0 - params.b + params.b * (dl / avgdl));
            scores[i] += idf * (tf * (params.k1 + 1.0)) / denom.max(1e-9);
        }
    }
    scores
}
