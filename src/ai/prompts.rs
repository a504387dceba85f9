use std::fmt::Write;

use crate::bids::{Bid, MARKUP_FACTOR};

pub const EXTRACTION_PROMPT: &str = r#"Analyse this public procurement notice. Extract its details and answer STRICTLY with a JSON object, without markdown.
Expected structure:
{
  "organization": "Contracting organization",
  "city": "City",
  "platform": "Bidding platform (e.g. Comprasnet, BLL)",
  "bidNumber": "Bid number",
  "processNumber": "Process number",
  "date": "Date as YYYY-MM-DD",
  "time": "Time as HH:MM",
  "modality": "Procedure type (electronic auction, in-person auction, electronic waiver, public call or competition)",
  "items": [
    { "description": "Item description", "referencePrice": numeric_float_value }
  ]
}"#;

/// Brazilian real formatting: `R$ 1.234,56`.
pub fn format_brl(value: f64) -> String {
    let cents = (value.max(0.0) * 100.0).round() as u64;
    let units = (cents / 100).to_string();
    let mut grouped = String::new();
    for (index, digit) in units.chars().enumerate() {
        if index > 0 && (units.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    format!("R$ {grouped},{:02}", cents % 100)
}

pub fn strategy_prompt(bid: &Bid, company: &str) -> String {
    let margin = ((MARKUP_FACTOR - 1.0) * 100.0).round();
    let mut items = String::new();
    for item in bid.items.items() {
        let cost = if item.cost_price.is_zero() {
            "not informed".to_string()
        } else {
            format_brl(item.cost_price.get())
        };
        let _ = writeln!(
            items,
            "- {} (Ref: {} / Expected cost: {})",
            item.description,
            format_brl(item.reference_price.get()),
            cost
        );
    }
    if items.is_empty() {
        items.push_str("- no items quoted yet\n");
    }

    format!(
        "You are a consultant specialised in Brazilian public procurement, working for {company}.\n\
         Evaluate the following upcoming bid:\n\
         Organization: {org} (Bid {number} - {modality})\n\
         Platform: {platform}\n\
         Session: {date} at {time}\n\
         \n\
         Quoted items:\n\
         {items}\n\
         The company's standard target margin is {margin}% above the expected cost.\n\
         Give a short analysis (at most 3 short paragraphs) of how attractive this bid is, \
         suggest a bidding strategy (aggressive or cautious) and point out anything that needs \
         attention given the prices above.",
        org = bid.organization,
        number = bid.bid_number,
        modality = bid.modality,
        platform = bid.platform,
        date = bid.date.format("%d/%m/%Y"),
        time = bid.time.format("%H:%M"),
    )
}

pub fn payment_reminder_prompt(bid: &Bid, company: &str) -> String {
    let deadline = bid
        .payment_deadline
        .map(|date| format!(" The agreed payment deadline was {}.", date.format("%d/%m/%Y")))
        .unwrap_or_default();

    format!(
        "You are a sales representative of \"{company}\". Write a formal, polite and direct email \
         to the public body \"{org}\".\n\
         The subject must clearly reference Bid {number}.\n\
         The body must state that the products were delivered and received by the organization, \
         and kindly ask for a forecast or confirmation of the payment of the closed total of \
         {value}.{deadline}\n\
         Leave the signature placeholders empty [Your Name/Department]. Do not use markdown.",
        org = bid.organization,
        number = bid.bid_number,
        value = format_brl(bid.value),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bids::BidDraft;
    use serde_json::json;

    fn bid() -> Bid {
        let draft: BidDraft = serde_json::from_value(json!({
            "id": "b1",
            "organization": "Prefeitura de Itu",
            "city": "Itu",
            "platform": "BLL",
            "bidNumber": "45/2025",
            "processNumber": "9/2025",
            "date": "2025-07-01",
            "time": "14:30",
            "modality": "Electronic Auction",
            "status": "delivered",
            "items": [
                { "id": "1", "description": "Toner", "referencePrice": 100, "costPrice": 50,
                  "isWon": true, "wonPrice": 1234.5 }
            ],
            "paymentDeadline": "2025-08-15"
        }))
        .unwrap();
        draft.into_bid(|| "unused".into()).unwrap()
    }

    #[test]
    fn formats_reais() {
        assert_eq!(format_brl(0.0), "R$ 0,00");
        assert_eq!(format_brl(1234.5), "R$ 1.234,50");
        assert_eq!(format_brl(1234567.891), "R$ 1.234.567,89");
        assert_eq!(format_brl(999.999), "R$ 1.000,00");
    }

    #[test]
    fn strategy_lists_items_and_margin() {
        let prompt = strategy_prompt(&bid(), "Acme Supplies");
        assert!(prompt.contains("working for Acme Supplies"));
        assert!(prompt.contains("- Toner (Ref: R$ 100,00 / Expected cost: R$ 50,00)"));
        assert!(prompt.contains("37% above the expected cost"));
    }

    #[test]
    fn reminder_quotes_the_closed_value() {
        let prompt = payment_reminder_prompt(&bid(), "Acme Supplies");
        assert!(prompt.contains("\"Prefeitura de Itu\""));
        assert!(prompt.contains("Bid 45/2025"));
        assert!(prompt.contains("R$ 1.234,50"));
        assert!(prompt.contains("15/08/2025"));
    }
}
