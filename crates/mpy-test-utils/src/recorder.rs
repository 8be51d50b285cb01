//! State-transition recording for assertions against a running `Session`.

use mpy_session::{ConnectionState, Session, StateEvent, SubscriptionHandle, TransportFactory};
use std::sync::{Arc, Mutex};

/// Captures every [`StateEvent`] a [`Session`] emits for the lifetime of
/// this recorder, so a test can assert on the exact transition sequence a
/// scenario produced instead of polling `Session::state`.
pub struct StateRecorder {
    events: Arc<Mutex<Vec<StateEvent>>>,
    _handle: SubscriptionHandle<StateEvent>,
}

impl StateRecorder {
    pub fn attach<F>(session: &Session<F>) -> StateRecorder
    where
        F: TransportFactory + 'static,
        F::Transport: 'static,
    {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let handle = session.subscribe_state(move |event| sink.lock().unwrap().push(event.clone()));
        StateRecorder { events, _handle: handle }
    }

    pub fn events(&self) -> Vec<StateEvent> {
        self.events.lock().unwrap().clone()
    }

    /// The `new` state of each recorded transition, in order.
    pub fn states(&self) -> Vec<ConnectionState> {
        self.events.lock().unwrap().iter().map(|e| e.new).collect()
    }

    pub fn assert_sequence(&self, expected: &[ConnectionState]) {
        let actual = self.states();
        assert_eq!(actual, expected, "unexpected connection state sequence");
    }
}
