use parking_lot::RwLock;
use pitwall_core::ClassifiedEvent;
use std::collections::VecDeque;

/// Histórico padrão mantido para novos observadores
pub const DEFAULT_EVENT_HISTORY: usize = 20;

/// Buffer limitado dos eventos mais recentes, do mais novo para o mais antigo
#[derive(Debug)]
pub struct EventStore {
    events: RwLock<VecDeque<ClassifiedEvent>>,
    capacity: usize,
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_HISTORY)
    }
}

impl EventStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: RwLock::new(VecDeque::with_capacity(capacity + 1)),
            capacity,
        }
    }

    /// Insere na cabeça e descarta o mais antigo ao exceder a capacidade.
    ///
    /// O timestamp nunca fica abaixo do evento anterior, então a ordem dos timestamps
    /// acompanha a ordem de gravação mesmo se o relógio do sistema recuar. Retorna o
    /// evento como foi gravado.
    pub fn record(&self, mut event: ClassifiedEvent) -> ClassifiedEvent {
        let mut events = self.events.write();
        if let Some(newest) = events.front() {
            if event.timestamp < newest.timestamp {
                event.timestamp = newest.timestamp;
            }
        }
        events.push_front(event.clone());
        while events.len() > self.capacity {
            events.pop_back();
        }
        event
    }

    /// Cópia do conteúdo atual, do mais novo para o mais antigo
    pub fn snapshot(&self) -> Vec<ClassifiedEvent> {
        self.events.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
