use eventq_domain::event::QueuedEvent;
use eventq_macros::queued_event;

#[queued_event]
struct OrderShippedEvent {
    order_id: String,
}

fn main() {
    assert_eq!(OrderShippedEvent::NAME, "order_shipped");
    let _ = OrderShippedEvent {
        order_id: "o-1".into(),
    }
    .clone();
}
