//! Token-budget packing.

use super::compression::compress;
use crate::models::{CompressedMemory, CompressionLevel, ScoredMemory};

/// Leftover tokens above which packed summaries are upgraded.
pub const UPGRADE_THRESHOLD: usize = 100;
/// Maximum number of summaries upgraded to expanded.
pub const MAX_UPGRADES: usize = 3;

/// Result of packing a ranked list into a budget.
#[derive(Debug, Clone, PartialEq)]
pub struct Packing {
    /// Packed items in rank order.
    pub items: Vec<(ScoredMemory, CompressedMemory)>,
    /// Tokens consumed.
    pub tokens_used: usize,
    /// True if ranked items were left out for lack of budget.
    pub truncated: bool,
}

/// Packs `ranked` into `max_tokens`.
///
/// Items are added at summary level until the next one would overflow; the
/// walk stops there. If more than [`UPGRADE_THRESHOLD`] tokens remain, the
/// first [`MAX_UPGRADES`] packed items are upgraded to expanded level while
/// each upgrade fits. Packing never exceeds `max_tokens` and is a pure
/// function of its inputs.
#[must_use]
pub fn pack(ranked: Vec<ScoredMemory>, max_tokens: usize) -> Packing {
    let total = ranked.len();
    let mut items = Vec::new();
    let mut used = 0usize;

    for scored in ranked {
        let summary = compress(&scored.memory, CompressionLevel::Summary);
        if used + summary.tokens > max_tokens {
            break;
        }
        used += summary.tokens;
        items.push((scored, summary));
    }
    let truncated = items.len() < total;

    let mut leftover = max_tokens - used;
    if leftover > UPGRADE_THRESHOLD {
        for (scored, compressed) in items.iter_mut().take(MAX_UPGRADES) {
            let expanded = compress(&scored.memory, CompressionLevel::Expanded);
            let cost = expanded.tokens.saturating_sub(compressed.tokens);
            if cost > leftover {
                break;
            }
            leftover -= cost;
            used += cost;
            *compressed = expanded;
        }
    }

    Packing {
        items,
        tokens_used: used,
        truncated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Memory, MemoryContent, TribalPayload};

    fn item(id: &str, summary_chars: usize) -> ScoredMemory {
        ScoredMemory {
            memory: Memory::new(
                id,
                "s".repeat(summary_chars),
                MemoryContent::Tribal(TribalPayload {
                    knowledge: "k".repeat(200),
                    ..TribalPayload::default()
                }),
            ),
            score: 0.5,
            reason: String::new(),
        }
    }

    #[test]
    fn test_stops_at_first_overflow() {
        // 40 tokens each.
        let ranked = vec![item("a", 160), item("b", 160), item("c", 8)];
        let packing = pack(ranked, 70);
        assert_eq!(packing.items.len(), 1);
        assert_eq!(packing.tokens_used, 40);
        assert!(packing.truncated);
        assert_eq!(packing.items[0].1.level, CompressionLevel::Summary);
    }

    #[test]
    fn test_zero_budget_packs_nothing() {
        let packing = pack(vec![item("a", 4)], 0);
        assert!(packing.items.is_empty());
        assert!(packing.truncated);
    }

    #[test]
    fn test_upgrades_when_room_left() {
        let ranked = vec![item("a", 40), item("b", 40), item("c", 40), item("d", 40)];
        let packing = pack(ranked, 2000);
        assert!(!packing.truncated);
        let levels: Vec<CompressionLevel> = packing.items.iter().map(|(_, c)| c.level).collect();
        assert_eq!(
            levels,
            [
                CompressionLevel::Expanded,
                CompressionLevel::Expanded,
                CompressionLevel::Expanded,
                CompressionLevel::Summary
            ]
        );
        let sum: usize = packing.items.iter().map(|(_, c)| c.tokens).sum();
        assert_eq!(sum, packing.tokens_used);
        assert!(packing.tokens_used <= 2000);
    }

    #[test]
    fn test_no_upgrade_at_threshold() {
        // 10 tokens packed, exactly 100 left.
        let packing = pack(vec![item("a", 40)], 110);
        assert_eq!(packing.items[0].1.level, CompressionLevel::Summary);
    }
}
