use eventq_domain::event::QueuedEvent;
use eventq_macros::queued_event;
use serde::Serialize;

#[queued_event(name = "audit", priority = "bulk_low")]
#[derive(Serialize, PartialEq)]
struct AuditTrail {
    actor: String,
    action: String,
}

fn main() {
    assert_eq!(<AuditTrail as QueuedEvent>::PRIORITY, Some("bulk_low"));
}
