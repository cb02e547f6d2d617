use crate::console::ViewState;
use crate::render::view_for;
use dispatch_offer::{Offer, OfferKey};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// The part of a snapshot worth redrawing for. Countdown ticks alone are not.
fn layout(offers: &[Offer]) -> Vec<OfferKey> {
    offers.iter().map(Offer::key).collect()
}

/// Redraws the current view whenever the visible offers or the view change.
pub fn spawn_screen(
    mut offers_rx: watch::Receiver<Vec<Offer>>,
    mut view_rx: watch::Receiver<ViewState>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_layout = layout(&offers_rx.borrow_and_update());
        let mut view = *view_rx.borrow_and_update();
        draw(&offers_rx.borrow(), view);

        loop {
            tokio::select! {
                changed = offers_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let offers = offers_rx.borrow_and_update().clone();
                    let current = layout(&offers);
                    if current != last_layout {
                        last_layout = current;
                        draw(&offers, view);
                    }
                }
                changed = view_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    view = *view_rx.borrow_and_update();
                    draw(&offers_rx.borrow(), view);
                }
            }
        }
        debug!("Screen closed");
    })
}

fn draw(offers: &[Offer], view: ViewState) {
    println!("{}", view_for(view.kind, view.position).render(offers));
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_offer::OfferQueue;
    use serde_json::json;

    #[test]
    fn test_layout_ignores_countdown() {
        let mut queue = OfferQueue::new(120);
        queue.ingest_payload(&json!({ "jobId": "J1" }), 0);
        let before = layout(&queue.visible());

        queue.tick(5_000);
        assert_eq!(layout(&queue.visible()), before);

        queue.ingest_payload(&json!({ "jobId": "J2" }), 5_000);
        assert_ne!(layout(&queue.visible()), before);
    }
}
