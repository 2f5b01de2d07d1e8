use super::*;

use tokio::time::advance;

const WINDOW: Duration = Duration::from_millis(300);

#[tokio::test(start_paused = true)]
async fn flush_fires_once_after_the_window() {
    let mut debounce = Debounce::new(WINDOW);
    debounce.touch();
    assert!(debounce.is_pending());
    assert!(!debounce.flush_due());

    advance(Duration::from_millis(299)).await;
    assert!(!debounce.flush_due());

    advance(Duration::from_millis(1)).await;
    assert!(debounce.flush_due());

    // The flush is consumed.
    assert!(!debounce.is_pending());
    assert!(!debounce.flush_due());
}

#[tokio::test(start_paused = true)]
async fn repeated_touches_restart_the_window() {
    let mut debounce = Debounce::new(WINDOW);
    debounce.touch();

    // Keep typing every 200ms; no flush fires while the edits keep coming.
    for _ in 0..5 {
        advance(Duration::from_millis(200)).await;
        assert!(!debounce.flush_due());
        debounce.touch();
    }

    advance(WINDOW).await;
    assert!(debounce.flush_due());
}

#[tokio::test(start_paused = true)]
async fn cancel_drops_the_pending_flush() {
    let mut debounce = Debounce::new(WINDOW);
    debounce.touch();
    debounce.cancel();

    advance(WINDOW).await;
    assert!(!debounce.flush_due());
    assert!(!debounce.is_pending());
}

#[tokio::test(start_paused = true)]
async fn untouched_debounce_never_fires() {
    let mut debounce = Debounce::new(WINDOW);
    advance(Duration::from_secs(60)).await;
    assert!(!debounce.flush_due());
    assert!(debounce.deadline().is_none());
}
