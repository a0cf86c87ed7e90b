use factcheck_common::RankedSource;

/// Keep the best `count` sources: score descending, ties by original search
/// rank. Sources below `min_score` are dropped first. Input order (arrival
/// order from the fan-out) does not matter.
pub fn select(mut ranked: Vec<RankedSource>, count: usize, min_score: f64) -> Vec<RankedSource> {
    ranked.retain(|r| r.relevance.score >= min_score);
    ranked.sort_by(|a, b| {
        b.relevance
            .score
            .total_cmp(&a.relevance.score)
            .then_with(|| a.source.rank.cmp(&b.source.rank))
    });
    ranked.truncate(count);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use factcheck_common::{Relevance, SearchResult};

    fn ranked(rank: usize, score: f64) -> RankedSource {
        RankedSource {
            source: SearchResult {
                title: format!("Result {rank}"),
                url: format!("https://example.org/{rank}"),
                rank,
            },
            raw_text: "text".into(),
            relevance: Relevance::new(score, "because"),
        }
    }

    fn ranks(selected: &[RankedSource]) -> Vec<usize> {
        selected.iter().map(|r| r.source.rank).collect()
    }

    #[test]
    fn orders_by_score_then_rank() {
        let input = vec![ranked(3, 5.0), ranked(0, 8.0), ranked(2, 8.0), ranked(1, 9.5)];
        assert_eq!(ranks(&select(input, 10, 0.0)), vec![1, 0, 2, 3]);
    }

    #[test]
    fn ties_ignore_arrival_order() {
        let forward = vec![ranked(0, 7.0), ranked(1, 7.0), ranked(2, 7.0)];
        let reverse = vec![ranked(2, 7.0), ranked(1, 7.0), ranked(0, 7.0)];
        assert_eq!(ranks(&select(forward, 2, 0.0)), vec![0, 1]);
        assert_eq!(ranks(&select(reverse, 2, 0.0)), vec![0, 1]);
    }

    #[test]
    fn keeps_at_most_count() {
        let input = (0..6).map(|i| ranked(i, i as f64)).collect();
        assert_eq!(ranks(&select(input, 3, 0.0)), vec![5, 4, 3]);
    }

    #[test]
    fn fewer_than_requested_is_fine() {
        let input = vec![ranked(0, 4.0)];
        assert_eq!(select(input, 3, 0.0).len(), 1);
        assert!(select(Vec::new(), 3, 0.0).is_empty());
    }

    #[test]
    fn zero_scores_survive_default_threshold() {
        let input = vec![ranked(0, 0.0), ranked(1, 0.0)];
        assert_eq!(select(input, 2, 0.0).len(), 2);
    }

    #[test]
    fn minimum_score_is_inclusive() {
        let input = vec![ranked(0, 2.0), ranked(1, 3.0), ranked(2, 6.0)];
        assert_eq!(ranks(&select(input, 5, 3.0)), vec![2, 1]);
    }
}
