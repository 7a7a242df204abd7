//! crates/detailing_core/src/knowledge.rs
//!
//! Retrieval helpers for the pricing knowledge base: the natural-language
//! context query, cosine ranking, and the built-in seed snippets.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{KnowledgeCategory, KnowledgeItem, KnowledgeMetadata, VehicleType};
use crate::ports::{EmbeddingService, KnowledgeFilter, KnowledgeStore, PortResult, ScoredKnowledge};
use crate::pricing::CalendarFeatures;

/// Describes a booking slot in words for the embedding search.
pub fn context_query(vehicle_type: VehicleType, features: CalendarFeatures) -> String {
    format!(
        "Pricing factors for {} vehicle, scheduled for {}, {} slot, in {}.",
        vehicle_type,
        if features.is_weekend() { "weekend" } else { "weekday" },
        features.time_of_day(),
        if features.is_peak_season() {
            "peak season"
        } else {
            "off-season"
        }
    )
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Whether an item passes a search filter.
pub fn matches_filter(item: &KnowledgeItem, filter: &KnowledgeFilter) -> bool {
    filter.category.map_or(true, |c| item.category == c)
        && filter.tenant_id.map_or(true, |t| item.tenant_id == Some(t))
}

/// Ranks candidates by similarity to `query`, most similar first.
pub fn rank_nearest(
    candidates: impl IntoIterator<Item = KnowledgeItem>,
    query: &[f32],
    limit: usize,
    filter: &KnowledgeFilter,
) -> Vec<ScoredKnowledge> {
    let mut scored: Vec<ScoredKnowledge> = candidates
        .into_iter()
        .filter(|item| matches_filter(item, filter))
        .map(|item| {
            let score = cosine_similarity(&item.embedding, query);
            ScoredKnowledge { item, score }
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(limit);
    scored
}

/// Market facts the platform ships with: (content, category, source).
pub fn default_snippets() -> Vec<(&'static str, KnowledgeCategory, &'static str)> {
    vec![
        (
            "Peak demand periods for auto detailing are typically Friday through Sunday, especially before holidays and special events. Prices can increase by 15-25% during these high-demand periods.",
            KnowledgeCategory::MarketTrends,
            "Industry Analysis 2024",
        ),
        (
            "Seasonal factors significantly impact pricing. Spring and summer see 30-40% higher demand due to better weather and vacation season. Winter detailing often includes salt removal and requires 20% more time.",
            KnowledgeCategory::SeasonalFactors,
            "Seasonal Demand Study",
        ),
        (
            "Larger vehicles (SUVs, trucks, vans) require 40-60% more time and materials than sedans. Luxury vehicles command 25-35% premium due to specialized care requirements and higher customer expectations.",
            KnowledgeCategory::ServiceCosts,
            "Service Cost Analysis",
        ),
        (
            "Customer loyalty programs show that repeat customers are willing to pay 10-15% more for guaranteed quality and convenience. First-time customers are more price-sensitive and respond well to introductory discounts.",
            KnowledgeCategory::CustomerBehavior,
            "Customer Retention Study",
        ),
        (
            "Local market competition analysis shows average exterior detail pricing ranges from $80-$150, interior from $120-$200, and full detail from $180-$350 depending on vehicle size and location.",
            KnowledgeCategory::Competition,
            "Competitive Market Analysis",
        ),
        (
            "Time-of-day pricing optimization: Morning slots (8am-11am) have lower demand and can be discounted 10-15%. Afternoon slots (2pm-5pm) are most popular and can command premium pricing.",
            KnowledgeCategory::MarketTrends,
            "Booking Pattern Analysis",
        ),
        (
            "Weather conditions impact demand significantly. Rainy days see 40% drop in bookings, while sunny days after rain see 25% increase. Dynamic pricing should adjust accordingly.",
            KnowledgeCategory::SeasonalFactors,
            "Weather Impact Study",
        ),
        (
            "Service bundling increases average transaction value by 35%. Customers booking multiple services are less price-sensitive and value convenience over individual service pricing.",
            KnowledgeCategory::CustomerBehavior,
            "Service Bundle Analysis",
        ),
    ]
}

/// Embeds and inserts the default snippets if the store is empty.
/// Returns how many items were inserted.
pub async fn seed_knowledge(
    embedder: &dyn EmbeddingService,
    store: &dyn KnowledgeStore,
) -> PortResult<usize> {
    if store.count_knowledge().await? > 0 {
        info!("Pricing knowledge already seeded, skipping.");
        return Ok(0);
    }

    let snippets = default_snippets();
    for (content, category, source) in &snippets {
        let embedding = embedder.embed(content).await?;
        store
            .insert_knowledge(KnowledgeItem {
                id: Uuid::new_v4(),
                tenant_id: None,
                content: content.to_string(),
                category: *category,
                metadata: KnowledgeMetadata {
                    source: source.to_string(),
                    last_updated: Utc::now(),
                    relevance_score: 1.0,
                },
                embedding,
            })
            .await?;
    }
    info!("Seeded {} pricing knowledge items.", snippets.len());
    Ok(snippets.len())
}
