//! Earliest-deadline-first / least-laxity domain ordering.

use crate::domain::Domain;

/// Order non-rest domains by `(deadline, slack, name)` ascending: earliest deadline first,
/// ties broken by least slack, final tie-break lexicographic on name for determinism.
pub fn order_domains<'a>(domains: &'a [Domain], current_tick: u64, max_gap_ticks: u64) -> Vec<&'a Domain> {
    let mut ordered: Vec<&Domain> = domains.iter().filter(|d| !d.is_rest()).collect();
    ordered.sort_by(|a, b| {
        a.deadline(max_gap_ticks)
            .cmp(&b.deadline(max_gap_ticks))
            .then_with(|| a.slack(current_tick, max_gap_ticks).cmp(&b.slack(current_tick, max_gap_ticks)))
            .then_with(|| a.name.cmp(&b.name))
    });
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_earliest_deadline_first() {
        let mut a = Domain::new("a", 1, 1.0);
        a.last_service_tick = 0;
        let mut b = Domain::new("b", 1, 1.0);
        b.last_service_tick = 5;
        let rest = Domain::new("rest", 0, 1.0);

        let domains = vec![b.clone(), a.clone(), rest];
        let ordered = order_domains(&domains, 0, 10);
        assert_eq!(ordered.len(), 2);
        assert_eq!(ordered[0].name, "a");
        assert_eq!(ordered[1].name, "b");
    }

    #[test]
    fn ties_break_lexicographically() {
        let x = Domain::new("x", 1, 1.0);
        let y = Domain::new("y", 1, 1.0);
        let domains = vec![y, x];
        let ordered = order_domains(&domains, 0, 10);
        assert_eq!(ordered[0].name, "x");
        assert_eq!(ordered[1].name, "y");
    }

    #[test]
    fn rest_domain_never_included() {
        let rest = Domain::new("rest", 0, 1.0);
        let domains = vec![rest];
        assert!(order_domains(&domains, 0, 10).is_empty());
    }
}
