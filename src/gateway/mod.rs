mod bridge;
pub mod codec;
pub mod fsm;
mod gate;

pub use bridge::Bridge;
pub use codec::{InboundCommand, OutboundFrame};
pub use fsm::{ConnectionEvent, ConnectionState, ConnectionStateMachine};
pub use gate::WriteGate;
