/*!
 * Pitwall Detector
 *
 * Pipeline de vigilância da mempool: decodificação de calldata, classificação de risco,
 * histórico limitado de eventos, difusão para observadores e resposta reativa opcional.
 */

pub mod decoder;
pub mod classifier;
pub mod event_store;
pub mod fanout;
pub mod watcher;
pub mod responder;

pub use decoder::*;
pub use classifier::*;
pub use event_store::*;
pub use fanout::*;
pub use watcher::*;
pub use responder::*;
