use async_trait::async_trait;
use booking_gateway::{
    Admission, Booking, BookingService, CreationError, FaultEvent, FaultPublisher,
    GatewayBuilder, PublishError, RejectionCause, State,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct RecordingBookings {
    created: Mutex<Vec<Value>>,
}

#[async_trait]
impl BookingService for RecordingBookings {
    async fn create_booking(&self, data: Value) -> Result<Booking, CreationError> {
        let code = data["code"].as_str().unwrap_or("unknown").to_owned();
        self.created.lock().push(data);
        Ok(Booking { code })
    }
}

struct FailingBookings;

#[async_trait]
impl BookingService for FailingBookings {
    async fn create_booking(&self, _data: Value) -> Result<Booking, CreationError> {
        Err(CreationError("booking code already exists".to_owned()))
    }
}

#[derive(Default)]
struct RecordingPublisher {
    events: Mutex<Vec<(String, String)>>,
}

impl RecordingPublisher {
    fn payloads(&self) -> Vec<String> {
        self.events.lock().iter().map(|(_, p)| p.clone()).collect()
    }
}

impl FaultPublisher for RecordingPublisher {
    fn publish(&self, event: &FaultEvent) -> Result<(), PublishError> {
        self.events
            .lock()
            .push((event.topic.clone(), event.payload().to_owned()));
        Ok(())
    }
}

struct FailingPublisher;

impl FaultPublisher for FailingPublisher {
    fn publish(&self, event: &FaultEvent) -> Result<(), PublishError> {
        Err(PublishError {
            topic: event.topic.clone(),
            reason: "broker unavailable".to_owned(),
        })
    }
}

fn booking(code: &str) -> Value {
    json!({
        "clinicId": 7,
        "code": code,
        "date": "2024-03-18",
        "startTime": "10:00",
        "endTime": "10:30",
    })
}

// Walks the gateway through a full trip-and-recovery cycle: fill the
// window, trip on the refused request (which still rides through), get
// short-circuited while open, then recover through a successful trial.
#[tokio::test]
async fn test_trip_and_recovery_cycle() {
    let bookings = Arc::new(RecordingBookings::default());
    let publisher = Arc::new(RecordingPublisher::default());

    let gateway = GatewayBuilder::new()
        .capacity(2)
        .window(Duration::from_millis(300))
        .error_threshold(0.001)
        .min_fires(1)
        .reset_timeout(Duration::from_millis(400))
        .fault_topic("bookings/circuit-fault")
        .build(bookings.clone(), publisher.clone());

    // R1, R2: capacity available.
    assert_eq!(
        gateway.admit(booking("AAA111")).await,
        Admission::Accepted { remaining: 1 }
    );
    assert_eq!(
        gateway.admit(booking("BBB222")).await,
        Admission::Accepted { remaining: 0 }
    );
    assert_eq!(gateway.breaker().current_state(), State::Closed);

    // R3: refused by the limiter, trips the breaker, still accepted.
    let r3 = gateway.admit(booking("CCC333")).await;
    assert!(matches!(r3, Admission::AcceptedAtCapacity { .. }));
    assert_eq!(gateway.breaker().current_state(), State::Open);
    assert_eq!(publisher.payloads(), vec!["true"]);
    assert_eq!(bookings.created.lock().len(), 3);

    // R4: short-circuited; the limiter is never consulted.
    let fires_before = gateway.breaker().fire_count();
    assert_eq!(
        gateway.admit(booking("DDD444")).await,
        Admission::Rejected(RejectionCause::BreakerOpen)
    );
    assert_eq!(gateway.breaker().fire_count(), fires_before);
    assert_eq!(gateway.limiter().remaining("bookings"), 0);
    assert_eq!(bookings.created.lock().len(), 3);

    // Past the reset timeout; the limiter window has rolled over too.
    tokio::time::sleep(Duration::from_millis(500)).await;

    // R5: half-open trial succeeds, breaker closes, counters reset.
    assert_eq!(
        gateway.admit(booking("EEE555")).await,
        Admission::Accepted { remaining: 1 }
    );
    assert_eq!(gateway.breaker().current_state(), State::Closed);
    assert_eq!(gateway.breaker().fire_count(), 0);
    assert_eq!(gateway.breaker().failure_count(), 0);
    assert_eq!(publisher.payloads(), vec!["true", "false", "false"]);
    assert_eq!(bookings.created.lock().len(), 4);
}

// A trial that fails its limiter check re-opens the breaker but is itself
// still admitted, and the re-open is broadcast again.
#[tokio::test]
async fn test_failed_trial_reopens_and_republishes() {
    let bookings = Arc::new(RecordingBookings::default());
    let publisher = Arc::new(RecordingPublisher::default());

    let gateway = GatewayBuilder::new()
        .capacity(1)
        .window(Duration::from_secs(60))
        .error_threshold(0.001)
        .min_fires(1)
        .reset_timeout(Duration::from_millis(150))
        .build(bookings.clone(), publisher.clone());

    assert!(matches!(
        gateway.admit(booking("AAA111")).await,
        Admission::Accepted { .. }
    ));
    assert!(matches!(
        gateway.admit(booking("BBB222")).await,
        Admission::AcceptedAtCapacity { .. }
    ));
    assert_eq!(gateway.breaker().current_state(), State::Open);

    tokio::time::sleep(Duration::from_millis(200)).await;

    // Window has not rolled over, so the trial's limiter check fails.
    let trial = gateway.admit(booking("CCC333")).await;
    assert!(matches!(trial, Admission::AcceptedAtCapacity { .. }));
    assert_eq!(gateway.breaker().current_state(), State::Open);
    assert_eq!(publisher.payloads(), vec!["true", "false", "true"]);
    assert_eq!(bookings.created.lock().len(), 3);

    // Freshly re-opened: short-circuited again.
    assert_eq!(
        gateway.admit(booking("DDD444")).await,
        Admission::Rejected(RejectionCause::BreakerOpen)
    );
}

#[tokio::test]
async fn test_downstream_failure_does_not_touch_admission_state() {
    let publisher = Arc::new(RecordingPublisher::default());

    let gateway = GatewayBuilder::new()
        .capacity(5)
        .window(Duration::from_secs(60))
        .build(Arc::new(FailingBookings), publisher.clone());

    // Admission already happened; the downstream error is logged only.
    assert_eq!(
        gateway.admit(booking("AAA111")).await,
        Admission::Accepted { remaining: 4 }
    );
    assert_eq!(gateway.breaker().current_state(), State::Closed);
    assert_eq!(gateway.breaker().failure_count(), 0);
    assert!(publisher.payloads().is_empty());
}

#[tokio::test]
async fn test_publish_failure_is_best_effort() {
    let bookings = Arc::new(RecordingBookings::default());

    let gateway = GatewayBuilder::new()
        .capacity(1)
        .window(Duration::from_secs(60))
        .error_threshold(0.001)
        .min_fires(1)
        .build(bookings.clone(), Arc::new(FailingPublisher));

    assert!(matches!(
        gateway.admit(booking("AAA111")).await,
        Admission::Accepted { .. }
    ));
    assert!(matches!(
        gateway.admit(booking("BBB222")).await,
        Admission::AcceptedAtCapacity { .. }
    ));

    // The breaker opened even though every publish failed.
    assert_eq!(gateway.breaker().current_state(), State::Open);
    assert_eq!(bookings.created.lock().len(), 2);
}

#[tokio::test]
async fn test_handle_message_routes_only_create() {
    let bookings = Arc::new(RecordingBookings::default());
    let publisher = Arc::new(RecordingPublisher::default());

    let gateway = GatewayBuilder::new()
        .capacity(2)
        .window(Duration::from_secs(60))
        .build(bookings.clone(), publisher.clone());

    let payload = serde_json::to_vec(&json!({
        "method": "create",
        "data": booking("AAA111"),
    }))
    .unwrap();
    let admission = gateway.handle_message(&payload).await;
    assert!(matches!(admission, Some(Admission::Accepted { .. })));
    assert_eq!(bookings.created.lock().len(), 1);

    // Unknown methods are dropped before any limiter work.
    let payload = serde_json::to_vec(&json!({
        "method": "delete",
        "data": booking("BBB222"),
    }))
    .unwrap();
    assert_eq!(gateway.handle_message(&payload).await, None);
    assert_eq!(gateway.limiter().remaining("bookings"), 1);

    // As are payloads that do not parse.
    assert_eq!(gateway.handle_message(b"not json").await, None);
    assert_eq!(gateway.limiter().remaining("bookings"), 1);
    assert_eq!(bookings.created.lock().len(), 1);
}
