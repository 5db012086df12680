//! Enum wrappers for transport dispatch.
//!
//! [`ReaderTransport`] has an associated session type, so it cannot be used
//! as a trait object. These enums provide concrete dispatch instead, letting
//! the binary pick mock or PC/SC at runtime while the writer and monitor
//! stay generic.
//!
//! # Examples
//!
//! ```
//! use tagbridge_hardware::devices::AnyTransport;
//! use tagbridge_hardware::mock::MockTransport;
//! use tagbridge_hardware::ReaderTransport;
//!
//! let (transport, _handle) = MockTransport::with_reader("Reader 0");
//! let any = AnyTransport::Mock(transport);
//! assert_eq!(any.list_readers().unwrap().len(), 1);
//! ```

use crate::mock::{MockSession, MockTransport};
#[cfg(feature = "hardware-pcsc")]
use crate::pcsc_transport::{PcscSession, PcscTransport};
use crate::{ApduResponse, ReaderTransport, Result, TagEventStream, TagSession};
use tagbridge_core::ReaderDescriptor;

/// Enum wrapper for transport dispatch.
#[non_exhaustive]
pub enum AnyTransport {
    /// Mock transport for development and testing.
    Mock(MockTransport),

    /// PC/SC readers.
    #[cfg(feature = "hardware-pcsc")]
    Pcsc(PcscTransport),
}

/// Session opened through an [`AnyTransport`].
#[non_exhaustive]
pub enum AnySession {
    Mock(MockSession),

    #[cfg(feature = "hardware-pcsc")]
    Pcsc(PcscSession),
}

impl ReaderTransport for AnyTransport {
    type Session = AnySession;

    fn list_readers(&self) -> Result<Vec<ReaderDescriptor>> {
        match self {
            Self::Mock(transport) => transport.list_readers(),
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(transport) => transport.list_readers(),
        }
    }

    fn connect(&self, reader: &str) -> Result<AnySession> {
        match self {
            Self::Mock(transport) => transport.connect(reader).map(AnySession::Mock),
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(transport) => transport.connect(reader).map(AnySession::Pcsc),
        }
    }

    fn watch(&self) -> Result<TagEventStream> {
        match self {
            Self::Mock(transport) => transport.watch(),
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(transport) => transport.watch(),
        }
    }
}

impl TagSession for AnySession {
    fn transmit(&mut self, command: &[u8]) -> Result<ApduResponse> {
        match self {
            Self::Mock(session) => session.transmit(command),
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(session) => session.transmit(command),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTag;
    use tagbridge_core::constants::GET_UID;

    #[test]
    fn test_any_transport_dispatches_to_mock() {
        let (transport, handle) = MockTransport::with_reader("Reader 0");
        handle
            .place_tag("Reader 0", MockTag::ntag213(vec![1, 2, 3, 4]))
            .unwrap();

        let any = AnyTransport::Mock(transport);
        let mut session = any.connect("Reader 0").unwrap();
        let response = session.transmit(&GET_UID).unwrap();
        assert_eq!(response.data, vec![1, 2, 3, 4]);
        assert_eq!(handle.commands(), vec![GET_UID.to_vec()]);
    }
}
