use crate::event_store::EventStore;
use parking_lot::Mutex;
use pitwall_core::{
    error::Result, traits::EventSink, ClassifiedEvent, Error, SubscriptionId, TelemetryMessage,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Identifica um observador conectado
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
}

impl SubscriptionHandle {
    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }
}

/// Difusão de eventos para os observadores conectados.
///
/// O conjunto de observadores e o histórico são alterados sob o mesmo lock, então um
/// observador recebe o snapshot e depois cada evento novo exatamente uma vez, na ordem
/// de gravação.
pub struct Fanout {
    store: Arc<EventStore>,
    observers: Mutex<HashMap<SubscriptionId, Box<dyn EventSink>>>,
}

impl Fanout {
    pub fn new(store: Arc<EventStore>) -> Self {
        Self {
            store,
            observers: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    /// Registra um observador e envia o histórico atual antes de qualquer evento novo
    pub fn attach(&self, sink: Box<dyn EventSink>) -> Result<SubscriptionHandle> {
        let mut observers = self.observers.lock();
        let snapshot = TelemetryMessage::Snapshot(self.store.snapshot());
        sink.deliver(&snapshot)?;

        let id = SubscriptionId(Uuid::new_v4().to_string());
        observers.insert(id.clone(), sink);
        debug!(subscription = %id.0, observers = observers.len(), "observador conectado");
        Ok(SubscriptionHandle { id })
    }

    /// Envia o evento a todos os observadores; os que falham são removidos
    pub fn publish(&self, event: &ClassifiedEvent) {
        let mut observers = self.observers.lock();
        Self::deliver_all(&mut observers, event);
    }

    /// Grava no histórico e publica de forma atômica
    pub fn commit(&self, event: ClassifiedEvent) {
        let mut observers = self.observers.lock();
        let event = self.store.record(event);
        Self::deliver_all(&mut observers, &event);
    }

    /// Remove o observador; chamadas repetidas são ignoradas
    pub fn detach(&self, handle: &SubscriptionHandle) -> bool {
        let removed = self.observers.lock().remove(&handle.id).is_some();
        if removed {
            debug!(subscription = %handle.id.0, "observador desconectado");
        }
        removed
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    fn deliver_all(observers: &mut HashMap<SubscriptionId, Box<dyn EventSink>>, event: &ClassifiedEvent) {
        if observers.is_empty() {
            return;
        }
        let message = TelemetryMessage::Event(event.clone());
        observers.retain(|id, sink| match sink.deliver(&message) {
            Ok(()) => true,
            Err(e) => {
                warn!(subscription = %id.0, error = %e, "removendo observador com falha");
                false
            }
        });
    }
}

/// Observador alimentado por um canal limitado; canal cheio ou fechado desconecta
pub struct ChannelSink {
    sender: mpsc::Sender<TelemetryMessage>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::Sender<TelemetryMessage>) -> Self {
        Self { sender }
    }

    /// Cria o sink e o receptor correspondente
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TelemetryMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

impl EventSink for ChannelSink {
    fn deliver(&self, message: &TelemetryMessage) -> Result<()> {
        self.sender.try_send(message.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Error::Other("buffer do observador cheio".to_string()),
            mpsc::error::TrySendError::Closed(_) => Error::Other("observador desconectado".to_string()),
        })
    }
}
