use serde::Serialize;

/// A purchasable credit pack. `amount` is in the currency's minor unit.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Plan {
    pub credits: i64,
    pub amount: i64,
    pub currency: &'static str,
    pub label: &'static str,
}

pub static PLANS: [Plan; 3] = [
    Plan {
        credits: 10,
        amount: 99_900,
        currency: "INR",
        label: "Starter",
    },
    Plan {
        credits: 25,
        amount: 199_900,
        currency: "INR",
        label: "Creator",
    },
    Plan {
        credits: 50,
        amount: 299_900,
        currency: "INR",
        label: "Studio",
    },
];

/// The plan matching both fields, if any. Clients may not pick their own price.
pub fn find_plan(credits: i64, amount: i64) -> Option<&'static Plan> {
    PLANS
        .iter()
        .find(|p| p.credits == credits && p.amount == amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_only_exact_pairs() {
        assert_eq!(find_plan(25, 199_900).map(|p| p.label), Some("Creator"));
        assert!(find_plan(25, 99_900).is_none());
        assert!(find_plan(1000, 1).is_none());
    }

    #[test]
    fn bigger_packs_are_cheaper_per_credit() {
        let per_credit: Vec<i64> = PLANS.iter().map(|p| p.amount / p.credits).collect();
        assert!(per_credit.windows(2).all(|w| w[0] > w[1]));
    }
}
