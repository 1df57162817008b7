use dockwire_frame::StreamKind;

type Callback<U> = Box<dyn FnMut(&U) + Send>;

struct Subscriber<U> {
    filter: Option<StreamKind>,
    callback: Callback<U>,
}

/// Ordered callback list shared by the blocking and async sessions.
///
/// One list holds every registration, so invocation order matches
/// registration order across all stream kinds.
pub(crate) struct Subscribers<U> {
    entries: Vec<Subscriber<U>>,
}

impl<U> Subscribers<U> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a callback. `None` receives every unit.
    pub(crate) fn push(&mut self, filter: Option<StreamKind>, callback: Callback<U>) {
        self.entries.push(Subscriber { filter, callback });
    }

    /// Deliver one unit to every matching subscriber, in order.
    pub(crate) fn dispatch(&mut self, unit: &U, kind: Option<StreamKind>) -> usize {
        let mut delivered = 0;
        for subscriber in &mut self.entries {
            if subscriber.filter.is_none() || subscriber.filter == kind {
                (subscriber.callback)(unit);
                delivered += 1;
            }
        }
        delivered
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
