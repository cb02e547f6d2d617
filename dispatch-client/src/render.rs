use dispatch_offer::Offer;
use std::fmt::Write;
use std::str::FromStr;

const PLACEHOLDER: &str = "—";

/// A stateless rendering of the visible offers.
pub trait OfferView: Send + Sync {
    fn name(&self) -> &'static str;

    fn render(&self, offers: &[Offer]) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Cards,
    Carousel,
    Tiles,
}

impl FromStr for ViewKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cards" | "stack" => Ok(ViewKind::Cards),
            "carousel" => Ok(ViewKind::Carousel),
            "tiles" | "inline" => Ok(ViewKind::Tiles),
            other => Err(format!("unknown view: {} (cards, carousel, tiles)", other)),
        }
    }
}

fn field(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or(PLACEHOLDER)
}

fn countdown(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Full detail for every offer, newest on top.
pub struct StackedCards;

impl OfferView for StackedCards {
    fn name(&self) -> &'static str {
        "cards"
    }

    fn render(&self, offers: &[Offer]) -> String {
        if offers.is_empty() {
            return "No pending job offers.\n".to_string();
        }

        let mut out = String::new();
        for offer in offers {
            let _ = writeln!(out, "┌ Job {}  [{}]  expires in {}", offer.job_id, offer.key(), countdown(offer.remaining_seconds));
            let _ = writeln!(out, "│ Issue:    {}", field(offer.issue.as_deref()));
            let _ = writeln!(out, "│ Vehicle:  {}", field(offer.vehicle_type.as_deref()));
            let _ = writeln!(out, "│ ETA:      {}", field(offer.eta.as_deref()));
            let _ = writeln!(out, "│ Customer: {}", field(offer.customer_name.as_ref().map(|n| n.expose().as_str())));
            let _ = writeln!(out, "│ Phone:    {}", field(offer.customer_phone.as_ref().map(|p| p.expose().as_str())));
            let _ = writeln!(out, "└ accept {0} | reject {0}", offer.key());
        }
        out
    }
}

/// One offer at a time with a cursor the user moves with `next` / `prev`.
pub struct Carousel {
    pub position: usize,
}

impl OfferView for Carousel {
    fn name(&self) -> &'static str {
        "carousel"
    }

    fn render(&self, offers: &[Offer]) -> String {
        if offers.is_empty() {
            return "No pending job offers.\n".to_string();
        }

        let index = self.position % offers.len();
        let offer = &offers[index];
        let mut out = format!("◀ {}/{} ▶\n", index + 1, offers.len());
        out.push_str(&StackedCards.render(std::slice::from_ref(offer)));
        out
    }
}

/// One line per offer. Only the last digits of the customer phone are shown.
pub struct InlineTiles;

impl OfferView for InlineTiles {
    fn name(&self) -> &'static str {
        "tiles"
    }

    fn render(&self, offers: &[Offer]) -> String {
        if offers.is_empty() {
            return "No pending job offers.\n".to_string();
        }

        offers
            .iter()
            .map(|o| {
                let phone = o.customer_phone.as_ref().map(|p| p.tail(4));
                format!(
                    "[{}] {} · {} · {} · {}\n",
                    o.key(),
                    field(o.issue.as_deref()),
                    field(o.eta.as_deref()),
                    field(phone.as_deref()),
                    countdown(o.remaining_seconds)
                )
            })
            .collect()
    }
}

pub fn view_for(kind: ViewKind, carousel_position: usize) -> Box<dyn OfferView> {
    match kind {
        ViewKind::Cards => Box::new(StackedCards),
        ViewKind::Carousel => Box::new(Carousel {
            position: carousel_position,
        }),
        ViewKind::Tiles => Box::new(InlineTiles),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_offer::OfferQueue;
    use serde_json::json;

    fn offers() -> Vec<Offer> {
        let mut queue = OfferQueue::new(120);
        queue.ingest_payload(&json!({ "jobId": "J1", "issue": "Flat tyre", "eta": "15 min", "customerPhone": "555-0100" }), 0);
        queue.ingest_payload(&json!({ "jobId": "J2", "slaSeconds": 65 }), 0);
        queue.visible()
    }

    #[test]
    fn test_cards_show_placeholders_for_missing_fields() {
        let text = StackedCards.render(&offers());
        assert!(text.contains("Job J2"));
        assert!(text.contains("expires in 1:05"));
        assert!(text.contains("Issue:    —"));
        assert!(text.contains("Phone:    555-0100"));
        assert!(text.find("Job J2").unwrap() < text.find("Job J1").unwrap());
    }

    #[test]
    fn test_carousel_wraps_position() {
        let offers = offers();
        let text = Carousel { position: 3 }.render(&offers);
        assert!(text.starts_with("◀ 2/2 ▶"));
        assert!(text.contains("Job J1"));
        assert!(!text.contains("Job J2"));
    }

    #[test]
    fn test_tiles_one_line_each() {
        let text = InlineTiles.render(&offers());
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("[J1:0] Flat tyre · 15 min · ****0100 · 2:00"));
        assert!(text.contains("[J2:0] — · — · — · 1:05"));
    }

    #[test]
    fn test_empty_queue() {
        for kind in [ViewKind::Cards, ViewKind::Carousel, ViewKind::Tiles] {
            assert_eq!(view_for(kind, 0).render(&[]), "No pending job offers.\n");
        }
    }
}
