//! Read-only views computed over the bid list.

use std::collections::BTreeMap;

use serde::Serialize;

use super::ledger::round_cents;
use super::{Bid, BidStatus};

pub const UPCOMING_LIMIT: usize = 5;

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total: usize,
    pub pending: usize,
    /// Won, partial, delivered and paid.
    pub won: usize,
    pub lost: usize,
    /// Value still owed: won, partial and delivered bids.
    pub receivable: f64,
    pub upcoming: Vec<Bid>,
}

impl Dashboard {
    /// `bids` must already be in schedule order.
    pub fn from_bids(bids: &[Bid]) -> Self {
        let count = |wanted: fn(&BidStatus) -> bool| bids.iter().filter(|b| wanted(&b.status)).count();
        let receivable = bids
            .iter()
            .filter(|bid| bid.status.is_receivable())
            .map(|bid| bid.value)
            .sum::<f64>();

        Self {
            total: bids.len(),
            pending: count(|status| *status == BidStatus::Pending),
            won: count(BidStatus::counts_won_items),
            lost: count(|status| *status == BidStatus::Lost),
            receivable: round_cents(receivable),
            upcoming: bids
                .iter()
                .filter(|bid| bid.status == BidStatus::Pending)
                .take(UPCOMING_LIMIT)
                .cloned()
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentsOverview {
    /// Sum over delivered bids that are not paid yet.
    pub outstanding: f64,
    pub bids: Vec<Bid>,
}

impl PaymentsOverview {
    pub fn from_bids(bids: Vec<Bid>) -> Self {
        let bids: Vec<Bid> = bids
            .into_iter()
            .filter(|bid| matches!(bid.status, BidStatus::Delivered | BidStatus::Paid))
            .collect();
        let outstanding = bids
            .iter()
            .filter(|bid| bid.status == BidStatus::Delivered)
            .map(|bid| bid.value)
            .sum::<f64>();

        Self {
            outstanding: round_cents(outstanding),
            bids,
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct CityGroup {
    pub city: String,
    pub bids: Vec<Bid>,
}

/// Groups bids by city, cities in alphabetical order. Order inside a group
/// follows the input.
pub fn group_by_city(bids: Vec<Bid>) -> Vec<CityGroup> {
    let mut groups: BTreeMap<String, Vec<Bid>> = BTreeMap::new();
    for bid in bids {
        groups.entry(bid.city.trim().to_string()).or_default().push(bid);
    }
    groups
        .into_iter()
        .map(|(city, bids)| CityGroup { city, bids })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::bids::BidDraft;

    fn bid(id: &str, city: &str, status: &str, won_price: f64) -> Bid {
        let draft: BidDraft = serde_json::from_value(json!({
            "id": id,
            "organization": "Org",
            "city": city,
            "platform": "BLL",
            "bidNumber": id,
            "processNumber": id,
            "date": "2025-05-20",
            "time": "09:00",
            "status": status,
            "items": [
                { "id": "1", "referencePrice": 100, "isWon": true, "wonPrice": won_price }
            ]
        }))
        .unwrap();
        draft.into_bid(|| id.to_string()).unwrap()
    }

    #[test]
    fn dashboard_counts_and_receivable() {
        let bids = vec![
            bid("1", "Itu", "pending", 0.0),
            bid("2", "Itu", "won", 80.0),
            bid("3", "Salto", "delivered", 20.25),
            bid("4", "Salto", "paid", 50.0),
            bid("5", "Tatuí", "lost", 0.0),
        ];

        let dashboard = Dashboard::from_bids(&bids);

        assert_eq!(dashboard.total, 5);
        assert_eq!(dashboard.pending, 1);
        assert_eq!(dashboard.won, 3);
        assert_eq!(dashboard.lost, 1);
        assert_eq!(dashboard.receivable, 100.25);
        assert_eq!(dashboard.upcoming.len(), 1);
        assert_eq!(dashboard.upcoming[0].id, "1");
    }

    #[test]
    fn upcoming_is_capped() {
        let bids: Vec<Bid> = (0..8)
            .map(|n| bid(&n.to_string(), "Itu", "pending", 0.0))
            .collect();
        assert_eq!(Dashboard::from_bids(&bids).upcoming.len(), UPCOMING_LIMIT);
    }

    #[test]
    fn payments_only_owe_delivered_bids() {
        let overview = PaymentsOverview::from_bids(vec![
            bid("1", "Itu", "won", 80.0),
            bid("2", "Itu", "delivered", 30.0),
            bid("3", "Itu", "paid", 50.0),
        ]);

        assert_eq!(overview.outstanding, 30.0);
        let ids: Vec<&str> = overview.bids.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
    }

    #[test]
    fn groups_cities_alphabetically() {
        let groups = group_by_city(vec![
            bid("1", "Salto", "won", 1.0),
            bid("2", "Itu ", "won", 1.0),
            bid("3", "Salto", "won", 1.0),
        ]);

        let cities: Vec<&str> = groups.iter().map(|g| g.city.as_str()).collect();
        assert_eq!(cities, vec!["Itu", "Salto"]);
        assert_eq!(groups[1].bids.len(), 2);
    }
}
