//! SNMP polling: transport seam, bounded poller and MIB decoders

pub mod decode;
pub mod oids;
pub mod poller;
pub mod transport;

pub use poller::{HostPoll, PollJob, Poller, SubtreeTables};
pub use transport::{PollError, Snmp2Transport, SnmpTransport, SnmpValue, VarBind, WalkFuture};
