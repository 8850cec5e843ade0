//! Listener registry: one any-message slot plus named listener lists

use std::{collections::HashMap, sync::Arc};

use crate::{message::Message, source::EventContext};

/// Callback receiving dispatched messages
pub type MessageListener = Arc<dyn Fn(&EventContext, &Message) + Send + Sync>;

/// Opaque token identifying one registration of a message listener.
///
/// Registering the same closure twice yields two tokens and two deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

pub(crate) type Entry = (ListenerId, MessageListener);

/// Listener lists are copied on write so a dispatch can run on a snapshot
/// while registrations change underneath it.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: u64,
    any: Option<Entry>,
    named: HashMap<String, Arc<[Entry]>>,
}

/// Listeners a single message is delivered to
pub(crate) struct Recipients {
    pub(crate) any: Option<Entry>,
    pub(crate) named: Option<Arc<[Entry]>>,
}

impl ListenerRegistry {
    fn next_id(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }

    /// `true` if anybody at all wants messages
    pub(crate) fn has_listeners(&self) -> bool {
        self.any.is_some() || !self.named.is_empty()
    }

    pub(crate) fn set_any(&mut self, listener: MessageListener) -> ListenerId {
        let id = self.next_id();
        self.any = Some((id, listener));
        id
    }

    pub(crate) fn clear_any(&mut self) -> bool {
        self.any.take().is_some()
    }

    pub(crate) fn add(&mut self, event_type: &str, listener: MessageListener) -> ListenerId {
        let id = self.next_id();
        let list: Arc<[Entry]> = match self.named.get(event_type) {
            Some(list) => list.iter().cloned().chain([(id, listener)]).collect(),
            None => Arc::from([(id, listener)]),
        };
        self.named.insert(event_type.to_owned(), list);
        id
    }

    pub(crate) fn remove(&mut self, event_type: &str, id: ListenerId) -> bool {
        let Some(list) = self.named.get(event_type) else {
            return false;
        };
        if !list.iter().any(|(entry, _)| *entry == id) {
            return false;
        }
        let remaining: Arc<[Entry]> = list.iter().filter(|(entry, _)| *entry != id).cloned().collect();
        if remaining.is_empty() {
            self.named.remove(event_type);
        } else {
            self.named.insert(event_type.to_owned(), remaining);
        }
        true
    }

    /// Removes a registration wherever it lives
    pub(crate) fn remove_id(&mut self, id: ListenerId) -> bool {
        if self.any.as_ref().is_some_and(|(entry, _)| *entry == id) {
            self.any = None;
            return true;
        }
        let event_type = self
            .named
            .iter()
            .find(|(_, list)| list.iter().any(|(entry, _)| *entry == id))
            .map(|(event_type, _)| event_type.clone());
        match event_type {
            Some(event_type) => self.remove(&event_type, id),
            None => false,
        }
    }

    /// Comments only go to the any-message listener, everything else also goes to the
    /// listeners registered for its type
    pub(crate) fn recipients(&self, message: &Message) -> Recipients {
        Recipients {
            any: self.any.clone(),
            named: message
                .event_type()
                .and_then(|event_type| self.named.get(event_type))
                .cloned(),
        }
    }
}
