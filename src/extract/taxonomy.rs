//! Category inference over a fixed, ordered keyword taxonomy
//!
//! The scan is deterministic and order-sensitive: categories are tried in
//! declaration order against the lowercased title+summary text, and the
//! first category with a matching keyword wins. Text matching no category
//! falls through to `competitive_analysis`.

use crate::models::Category;

/// Ordered keyword table; earlier entries take precedence
const TAXONOMY: &[(Category, &[&str])] = &[
    (
        Category::ProductLaunch,
        &[
            "launch",
            "launches",
            "launched",
            "unveil",
            "unveils",
            "unveiled",
            "releases",
            "released",
            "introduces",
            "rollout",
            "general availability",
            "now available",
        ],
    ),
    (
        Category::Funding,
        &[
            "funding",
            "raises",
            "raised",
            "series a",
            "series b",
            "series c",
            "seed round",
            "investment round",
            "investors",
            "valuation",
        ],
    ),
    (
        Category::Acquisition,
        &[
            "acquisition",
            "acquires",
            "acquired",
            "merger",
            "merges",
            "buyout",
            "takeover",
        ],
    ),
    (
        Category::Partnership,
        &[
            "partnership",
            "partners with",
            "teams up",
            "collaboration",
            "alliance",
            "joint venture",
            "integration with",
        ],
    ),
    (
        Category::LeadershipChange,
        &[
            "appoints",
            "appointed",
            "joins as",
            "steps down",
            "resigns",
            "new ceo",
            "new cto",
            "new cfo",
            "chief executive",
            "promoted to",
        ],
    ),
    (
        Category::Regulation,
        &[
            "regulation",
            "regulatory",
            "compliance",
            "antitrust",
            "lawsuit",
            "settlement",
            "gdpr",
            "ruling",
            "fined",
        ],
    ),
    (
        Category::SecurityIncident,
        &[
            "breach",
            "vulnerability",
            "exploit",
            "ransomware",
            "cyberattack",
            "data leak",
            "zero-day",
            "cve-",
        ],
    ),
    (
        Category::Hiring,
        &[
            "hiring",
            "job opening",
            "recruiting",
            "headcount",
            "layoffs",
            "restructuring",
        ],
    ),
    (
        Category::MarketTrend,
        &[
            "market share",
            "forecast",
            "quarterly results",
            "earnings",
            "revenue growth",
            "industry report",
            "benchmark",
        ],
    ),
];

/// Infer the category of an item from its title and summary
///
/// `text` is expected lowercased; callers pass title+summary joined.
pub fn infer_category(text: &str) -> Category {
    let text = text.to_lowercase();
    for (category, keywords) in TAXONOMY {
        if keywords.iter().any(|kw| text.contains(kw)) {
            return *category;
        }
    }
    Category::CompetitiveAnalysis
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_basic_matches() {
        assert_eq!(
            infer_category("Acme launches new analytics platform"),
            Category::ProductLaunch
        );
        assert_eq!(
            infer_category("Acme raises $40M in Series B funding"),
            Category::Funding
        );
        assert_eq!(
            infer_category("Regulator fined Acme over data practices"),
            Category::Regulation
        );
        assert_eq!(
            infer_category("Acme discloses breach affecting 2M users"),
            Category::SecurityIncident
        );
    }

    #[test]
    fn test_infer_is_case_insensitive() {
        assert_eq!(
            infer_category("ACME UNVEILS FLAGSHIP DEVICE"),
            Category::ProductLaunch
        );
    }

    #[test]
    fn test_infer_default_category() {
        assert_eq!(
            infer_category("An unremarkable note about the weather"),
            Category::CompetitiveAnalysis
        );
        assert_eq!(infer_category(""), Category::CompetitiveAnalysis);
    }

    #[test]
    fn test_infer_first_declared_wins() {
        // matches both product_launch ("launches") and funding ("funding");
        // the earlier table entry must win
        assert_eq!(
            infer_category("Acme launches fund after record funding year"),
            Category::ProductLaunch
        );
        // matches both funding and acquisition; funding is declared first
        assert_eq!(
            infer_category("Funding round precedes rumored acquisition"),
            Category::Funding
        );
    }

    #[test]
    fn test_infer_deterministic() {
        let text = "Acme partners with Globex on joint venture";
        let first = infer_category(text);
        for _ in 0..10 {
            assert_eq!(infer_category(text), first);
        }
    }
}
