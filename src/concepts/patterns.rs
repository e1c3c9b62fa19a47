// Pattern channels - the seven concept classes pulled out of a text source.
//
// Every class is a cheap lexical heuristic: there is no tagger or NER model
// behind these. Each match is one occurrence; the extractor applies the
// class multiplier on top of the source weight.

use anyhow::{Context, Result};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::normalize::{normalize_term, StopWords};

/// Concept class, in extraction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptType {
    Noun,
    Technical,
    Domain,
    Entity,
    Phrase,
    Compound,
    Acronym,
}

impl ConceptType {
    /// Weight multiplier applied on top of the source weight.
    pub fn multiplier(self) -> f64 {
        match self {
            ConceptType::Noun => 1.0,
            ConceptType::Technical => 1.2,
            ConceptType::Domain => 1.5,
            ConceptType::Entity => 1.3,
            ConceptType::Phrase => 1.1,
            ConceptType::Compound => 1.2,
            ConceptType::Acronym => 1.4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConceptType::Noun => "noun",
            ConceptType::Technical => "technical",
            ConceptType::Domain => "domain",
            ConceptType::Entity => "entity",
            ConceptType::Phrase => "phrase",
            ConceptType::Compound => "compound",
            ConceptType::Acronym => "acronym",
        }
    }
}

impl std::fmt::Display for ConceptType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw match from a pattern channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub text: String,
    pub concept_type: ConceptType,
    pub category: String,
}

impl Candidate {
    fn new(text: &str, concept_type: ConceptType) -> Self {
        Self {
            text: text.trim().to_string(),
            concept_type,
            category: concept_type.as_str().to_string(),
        }
    }

    fn with_category(text: &str, concept_type: ConceptType, category: &str) -> Self {
        Self {
            text: text.trim().to_string(),
            concept_type,
            category: category.to_string(),
        }
    }
}

/// All-caps words that look like acronyms but carry no meaning.
const ACRONYM_STOPLIST: &[&str] = &[
    "A", "AN", "AND", "ARE", "AS", "AT", "BE", "BUT", "BY", "DO", "FOR", "FROM", "HE", "IF",
    "IN", "IS", "IT", "ME", "MY", "NO", "NOT", "OF", "OK", "ON", "OR", "SO", "THE", "TO", "UP",
    "US", "WE", "YOU", "ALL", "CAN", "NOTE", "TODO", "WARNING", "TIP", "IMPORTANT",
];

/// Phrase chunks longer than this many words are skipped.
const MAX_PHRASE_WORDS: usize = 4;

/// Compiled regexes for every channel plus the domain gazetteer.
pub struct PatternSet {
    technical: Vec<Regex>,
    person: Regex,
    place: Regex,
    organization: Regex,
    title_run: Regex,
    lower_run: Regex,
    hyphen_run: Regex,
    acronym: Regex,
    abbreviation: Regex,
    word: Regex,
    sentence_break: Regex,
    gazetteer: Vec<(String, Regex)>,
}

impl PatternSet {
    /// Compile the fixed channels and the gazetteer.
    ///
    /// Gazetteer terms are escaped before compilation; a term that still
    /// fails to compile is logged and skipped.
    pub fn new(domain_terms: &[String]) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).with_context(|| format!("Invalid built-in pattern: {pattern}"))
        };

        let technical = vec![
            // Acronyms with optional version digits: HTTP, ERC20
            compile(r"\b[A-Z]{2,}[0-9]*\b")?,
            // Dotted notation: std.io, config.yaml
            compile(r"\b[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)+\b")?,
            // Hyphen or underscore tokens: snake_case, kebab-case
            compile(r"\b[A-Za-z][A-Za-z0-9]*(?:[-_][A-Za-z0-9]+)+\b")?,
            // camelCase
            compile(r"\b[a-z]+(?:[A-Z][a-z0-9]+)+\b")?,
        ];

        let mut gazetteer = Vec::with_capacity(domain_terms.len());
        for term in domain_terms {
            let trimmed = term.trim();
            if trimmed.is_empty() {
                continue;
            }
            match Regex::new(&gazetteer_pattern(trimmed)) {
                Ok(re) => gazetteer.push((trimmed.to_string(), re)),
                Err(e) => {
                    warn!(term = trimmed, error = %e, "Skipping domain term that failed to compile")
                }
            }
        }

        Ok(Self {
            technical,
            person: compile(r"\b(?:Mr|Mrs|Ms|Dr|Prof)\.?\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?")?,
            place: compile(r"\b(?:in|at|from|near)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)")?,
            organization: compile(
                r"\b(?:[A-Z][A-Za-z0-9&]*\s+)+(?:Inc|Corp|Corporation|Foundation|Labs|Ltd|LLC|University|Institute|Company|Group)\b",
            )?,
            title_run: compile(r"\b[A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)+\b")?,
            lower_run: compile(r"\b[a-z]{3,}[ \t]+[a-z]{3,}[ \t]+[a-z]{3,}\b")?,
            hyphen_run: compile(r"\b[A-Za-z]+(?:-[A-Za-z]+){2,}\b")?,
            acronym: compile(r"\b[A-Z]{2,6}s?\b")?,
            abbreviation: compile(r"\b(?:[A-Z]\.){2,}")?,
            word: compile(r"\b[A-Za-z]+\b")?,
            sentence_break: compile(r"[.!?;:,()\[\]\n\r]+")?,
            gazetteer,
        })
    }

    pub fn gazetteer_len(&self) -> usize {
        self.gazetteer.len()
    }

    /// Run every channel over `text`.
    pub fn extract(&self, text: &str, stop_words: &StopWords) -> Vec<Candidate> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut out = Vec::new();
        self.extract_nouns(text, stop_words, &mut out);
        self.extract_technical(text, &mut out);
        self.extract_domain(text, &mut out);
        self.extract_entities(text, &mut out);
        self.extract_phrases(text, stop_words, &mut out);
        self.extract_compounds(text, &mut out);
        self.extract_acronyms(text, &mut out);
        out
    }

    /// Single non-stop words; `-ly` adverbs are dropped.
    fn extract_nouns(&self, text: &str, stop_words: &StopWords, out: &mut Vec<Candidate>) {
        for m in self.word.find_iter(text) {
            let lower = m.as_str().to_lowercase();
            if lower.ends_with("ly") || stop_words.contains(&lower) {
                continue;
            }
            out.push(Candidate::new(m.as_str(), ConceptType::Noun));
        }
    }

    fn extract_technical(&self, text: &str, out: &mut Vec<Candidate>) {
        for re in &self.technical {
            for m in re.find_iter(text) {
                out.push(Candidate::new(m.as_str(), ConceptType::Technical));
            }
        }
    }

    fn extract_domain(&self, text: &str, out: &mut Vec<Candidate>) {
        for (term, re) in &self.gazetteer {
            for _ in re.find_iter(text) {
                out.push(Candidate::with_category(term, ConceptType::Domain, "domain"));
            }
        }
    }

    fn extract_entities(&self, text: &str, out: &mut Vec<Candidate>) {
        for m in self.person.find_iter(text) {
            out.push(Candidate::with_category(m.as_str(), ConceptType::Entity, "person"));
        }
        for caps in self.place.captures_iter(text) {
            if let Some(place) = caps.get(1) {
                out.push(Candidate::with_category(place.as_str(), ConceptType::Entity, "place"));
            }
        }
        for m in self.organization.find_iter(text) {
            out.push(Candidate::with_category(
                m.as_str(),
                ConceptType::Entity,
                "organization",
            ));
        }
    }

    /// Noun phrases: runs of 2-4 non-stop words inside a sentence fragment,
    /// longer than five characters.
    fn extract_phrases(&self, text: &str, stop_words: &StopWords, out: &mut Vec<Candidate>) {
        for fragment in self.sentence_break.split(text) {
            let mut chunk: Vec<&str> = Vec::new();
            for token in fragment.split_whitespace() {
                let token = token.trim_matches(|c: char| !c.is_alphanumeric());
                let is_break = token.is_empty()
                    || !token.chars().any(|c| c.is_alphabetic())
                    || stop_words.contains(&normalize_term(token));
                if is_break {
                    flush_phrase(&mut chunk, out);
                } else {
                    chunk.push(token);
                }
            }
            flush_phrase(&mut chunk, out);
        }
    }

    fn extract_compounds(&self, text: &str, out: &mut Vec<Candidate>) {
        for re in [&self.title_run, &self.lower_run, &self.hyphen_run] {
            for m in re.find_iter(text) {
                out.push(Candidate::new(m.as_str(), ConceptType::Compound));
            }
        }
    }

    fn extract_acronyms(&self, text: &str, out: &mut Vec<Candidate>) {
        for m in self.acronym.find_iter(text) {
            let bare = m.as_str().trim_end_matches('s');
            if ACRONYM_STOPLIST.contains(&bare) {
                continue;
            }
            out.push(Candidate::new(m.as_str(), ConceptType::Acronym));
        }
        for m in self.abbreviation.find_iter(text) {
            out.push(Candidate::new(m.as_str(), ConceptType::Acronym));
        }
    }
}

/// Case-insensitive literal match for a gazetteer term. A word boundary is
/// only required on an edge that is itself a word character, so terms such as
/// `c++` or `.net` still match.
fn gazetteer_pattern(term: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let lead = if term.chars().next().is_some_and(is_word) { r"\b" } else { "" };
    let trail = if term.chars().last().is_some_and(is_word) { r"\b" } else { "" };
    format!("(?i){lead}{}{trail}", regex_lite::escape(term))
}

fn flush_phrase(chunk: &mut Vec<&str>, out: &mut Vec<Candidate>) {
    if (2..=MAX_PHRASE_WORDS).contains(&chunk.len()) {
        let phrase = chunk.join(" ");
        if phrase.chars().count() > 5 {
            out.push(Candidate::new(&phrase, ConceptType::Phrase));
        }
    }
    chunk.clear();
}
