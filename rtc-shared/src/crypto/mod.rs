use crate::error::Result;

/// RFC 5764 section 4.2 exporter label for DTLS-SRTP.
pub const LABEL_EXTRACTOR_DTLS_SRTP: &str = "EXTRACTOR-dtls_srtp";

/// RFC 5705 keying material export of a finished DTLS session, consumed by
/// SRTP without either crate depending on the other.
pub trait KeyingMaterialExporter {
    fn export_keying_material(&self, label: &str, context: &[u8], length: usize)
    -> Result<Vec<u8>>;

    /// `client_write_key | server_write_key | client_write_salt | server_write_salt`
    fn export_dtls_srtp_keying_material(&self, length: usize) -> Result<Vec<u8>> {
        self.export_keying_material(LABEL_EXTRACTOR_DTLS_SRTP, &[], length)
    }
}
