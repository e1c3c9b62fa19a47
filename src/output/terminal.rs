// Colored terminal output for concept tables, comparisons and clusters.
//
// main.rs gathers the data and delegates all formatting here.

use colored::Colorize;

use super::truncate_chars;
use crate::cache::CacheStats;
use crate::concepts::TopConcept;
use crate::similarity::{DuplicateCluster, Recommendation, SimilarDocument, SimilarityResult};

/// Ranked table of the most frequent concepts.
pub fn display_top_concepts(concepts: &[TopConcept]) {
    if concepts.is_empty() {
        println!("No concepts extracted. Is the corpus empty?");
        return;
    }

    println!(
        "\n{}",
        format!("=== Top Concepts ({}) ===", concepts.len()).bold()
    );
    println!();
    println!(
        "  {:>4}  {:<36} {:<12} {:>6}  {:>5}  {:>8}",
        "Rank".dimmed(),
        "Concept".dimmed(),
        "Category".dimmed(),
        "Freq".dimmed(),
        "Files".dimmed(),
        "Weight".dimmed(),
    );
    println!("  {}", "-".repeat(80).dimmed());

    for (i, concept) in concepts.iter().enumerate() {
        println!(
            "  {:>4}. {:<36} {:<12} {:>6}  {:>5}  {:>8.1}",
            i + 1,
            truncate_chars(&concept.text, 33),
            concept.category.cyan(),
            concept.frequency,
            concept.file_count,
            concept.total_weight,
        );
    }
    println!();
}

/// Full breakdown of one comparison.
pub fn display_comparison(result: &SimilarityResult) {
    println!(
        "\n{}",
        format!("=== {} vs {} ===", result.document_a, result.document_b).bold()
    );
    println!(
        "  Overall: {}  {}",
        colorize_score(result.overall_score),
        colorize_recommendation(result.recommendation)
    );
    println!();
    println!(
        "  Exact:      {}  (trigram jaccard {:.2}, jaro-winkler {:.2})",
        colorize_score(result.exact.score),
        result.exact.jaccard,
        result.exact.jaro_winkler
    );
    println!(
        "  Conceptual: {}  ({} shared concepts)",
        colorize_score(result.conceptual.score),
        result.conceptual.shared_concepts.len()
    );
    println!("  Semantic:   {}", colorize_score(result.semantic.score));

    if !result.conceptual.shared_concepts.is_empty() {
        let names: Vec<&str> = result
            .conceptual
            .shared_concepts
            .iter()
            .take(10)
            .map(|c| c.concept.as_str())
            .collect();
        println!("\n  Shared: {}", names.join(", ").dimmed());
    }

    if !result.exact.duplicated_segments.is_empty() {
        println!(
            "\n  {} duplicated passages:",
            result.exact.duplicated_segments.len()
        );
        for (i, segment) in result.exact.duplicated_segments.iter().enumerate() {
            println!(
                "    {}. [{:.2}] {}",
                i + 1,
                segment.similarity,
                truncate_chars(&segment.source, 120).dimmed()
            );
        }
    }
    println!();
}

/// Documents most similar to `path`.
pub fn display_similar(path: &str, similar: &[SimilarDocument]) {
    if similar.is_empty() {
        println!("No documents similar to {path} above the threshold.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Similar to {path} ({}) ===", similar.len()).bold()
    );
    println!();
    for (i, doc) in similar.iter().enumerate() {
        println!(
            "  {:>3}. {:<48} {}  {}",
            i + 1,
            truncate_chars(&doc.path, 45),
            colorize_score(doc.similarity.overall_score),
            colorize_recommendation(doc.similarity.recommendation),
        );
    }
    println!();
}

pub fn display_clusters(clusters: &[DuplicateCluster]) {
    if clusters.is_empty() {
        println!("No duplicate clusters found.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Duplicate Clusters ({}) ===", clusters.len()).bold()
    );
    for (i, cluster) in clusters.iter().enumerate() {
        println!(
            "\n  Cluster {} ({} documents, avg {})",
            i + 1,
            cluster.documents.len(),
            colorize_score(cluster.avg_similarity)
        );
        for (j, doc) in cluster.documents.iter().enumerate() {
            let marker = if j == 0 { "*".bold() } else { "-".dimmed() };
            println!("    {marker} {doc}");
        }
    }

    let documents: usize = clusters.iter().map(|c| c.documents.len()).sum();
    println!(
        "\n  {} {} documents in {} clusters",
        "!".yellow(),
        documents,
        clusters.len()
    );
}

pub fn display_cache_stats(stats: &CacheStats) {
    println!(
        "  {}",
        format!(
            "cache: {} hits, {} misses, {} entries",
            stats.hits, stats.misses, stats.entries
        )
        .dimmed()
    );
}

fn colorize_score(score: f64) -> colored::ColoredString {
    let text = format!("{score:.2}");
    match score {
        s if s >= 0.9 => text.red().bold(),
        s if s >= 0.7 => text.bright_red(),
        s if s >= 0.5 => text.yellow(),
        _ => text.green(),
    }
}

fn colorize_recommendation(recommendation: Recommendation) -> colored::ColoredString {
    let label = recommendation.as_str();
    match recommendation {
        Recommendation::HighlyDuplicate => label.red().bold(),
        Recommendation::Duplicate => label.bright_red(),
        Recommendation::Similar | Recommendation::ExactTextMatch => label.yellow(),
        Recommendation::ConceptualOverlap => label.cyan(),
        Recommendation::Related => label.dimmed(),
    }
}
