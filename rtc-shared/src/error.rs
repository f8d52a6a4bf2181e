#![allow(dead_code)]

use std::io;
use std::net;
use std::num::ParseIntError;
use std::string::FromUtf8Error;
use std::time::SystemTimeError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of [`Error`], used by callers that only care about the class of a
/// failure, e.g. whether it should move a connection to the failed state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Operation not permitted in the current signaling or connection state.
    InvalidState,
    /// Malformed or inconsistent session description.
    InvalidSdp,
    /// Remote DTLS certificate does not hash to any advertised fingerprint.
    FingerprintMismatch,
    /// ICE could not establish a usable candidate pair.
    IceFailure(IceFailureReason),
    /// DTLS handshake alert or timeout.
    DtlsFailure,
    /// SRTP/SRTCP authentication or replay failure of a single packet.
    CryptoFailure,
    /// Write on a closed or failed transport.
    TransportClosed,
    /// No codec intersection or unsupported protection profile.
    CapabilityUnsupported,
    /// Send buffer above its configured ceiling.
    BackpressureExceeded,
    /// Cancelled by the caller.
    Cancelled,
    /// Everything else: codec errors, malformed packets, parse errors.
    Other,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum IceFailureReason {
    NoRemoteCandidates,
    AllPairsFailed,
    RestartAborted,
}

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("buffer: full")]
    ErrBufferFull,
    #[error("buffer: closed")]
    ErrBufferClosed,
    #[error("buffer: short")]
    ErrBufferShort,
    #[error("packet too big")]
    ErrPacketTooBig,
    #[error("i/o timeout")]
    ErrTimeout,
    #[error("already closed")]
    ErrAlreadyClosed,
    #[error("cancelled by caller")]
    ErrCancelled,
    #[error("not found")]
    ErrNotFound,
    #[error("host name must not be empty")]
    ErrHostnameEmpty,
    #[error("failed to parse IP address")]
    ErrFailedToParseIpaddr,

    //ExportKeyingMaterial errors
    #[error("tls handshake is in progress")]
    HandshakeInProgress,
    #[error("context is not supported for export_keying_material")]
    ContextUnsupported,
    #[error("export_keying_material can not be used with a reserved label")]
    ReservedExportKeyingMaterial,
    #[error("no cipher suite for export_keying_material")]
    CipherSuiteUnset,

    //RTCP errors
    /// Wrong marshal size.
    #[error("Wrong marshal size")]
    WrongMarshalSize,
    /// Packet lost exceeds maximum amount of packets
    /// that can possibly be lost.
    #[error("Invalid total lost count")]
    InvalidTotalLost,
    /// Packet contains an invalid header.
    #[error("Invalid header")]
    InvalidHeader,
    /// Packet contains empty compound.
    #[error("Empty compound packet")]
    EmptyCompound,
    /// Invalid first packet in compound packets. First packet
    /// should either be a SenderReport packet or ReceiverReport
    #[error("First packet in compound must be SR or RR")]
    BadFirstPacket,
    /// CNAME was not defined.
    #[error("Compound missing SourceDescription with CNAME")]
    MissingCname,
    /// Packet was defined before CNAME.
    #[error("Feedback packet seen before CNAME")]
    PacketBeforeCname,
    #[error("Too many reports")]
    TooManyReports,
    #[error("Too many chunks")]
    TooManyChunks,
    #[error("too many sources")]
    TooManySources,
    #[error("Packet status chunk must be 2 bytes")]
    PacketTooShort,
    #[error("Buffer too short to be written")]
    BufferTooShort,
    #[error("Wrong packet type")]
    WrongType,
    #[error("SDES must be < 255 octets long")]
    SdesTextTooLong,
    #[error("SDES item missing type")]
    SdesMissingType,
    #[error("Reason must be < 255 octets long")]
    ReasonTooLong,
    #[error("Invalid packet version")]
    BadVersion,
    #[error("Invalid padding value")]
    WrongPadding,
    #[error("Wrong feedback message type")]
    WrongFeedbackType,
    #[error("Wrong payload type")]
    WrongPayloadType,
    #[error("Header length is too small")]
    HeaderTooSmall,
    #[error("Media SSRC must be 0")]
    SsrcMustBeZero,
    #[error("Missing REMB identifier")]
    MissingRembIdentifier,
    #[error("SSRC num and length do not match")]
    SsrcNumAndLengthMismatch,
    #[error("Invalid size or startIndex")]
    InvalidSizeOrStartIndex,
    #[error("Delta exceed limit")]
    DeltaExceedLimit,
    #[error("Packet status chunk must be 2 bytes")]
    PacketStatusChunkLength,
    #[error("Invalid bitrate")]
    InvalidBitrate,
    #[error("Wrong chunk type")]
    WrongChunkType,

    //RTP errors
    #[error("RTP header size insufficient")]
    ErrHeaderSizeInsufficient,
    #[error("RTP header size insufficient for extension")]
    ErrHeaderSizeInsufficientForExtension,
    #[error("buffer too small")]
    ErrBufferTooSmall,
    #[error("extension not enabled")]
    ErrHeaderExtensionsNotEnabled,
    #[error("extension not found")]
    ErrHeaderExtensionNotFound,
    #[error("header extension id must be between 1 and 14 for RFC 5285 one byte extensions")]
    ErrRfc8285oneByteHeaderIdrange,
    #[error("header extension payload must be 16bytes or less for RFC 5285 one byte extensions")]
    ErrRfc8285oneByteHeaderSize,
    #[error("header extension id must be between 1 and 255 for RFC 5285 two byte extensions")]
    ErrRfc8285twoByteHeaderIdrange,
    #[error("header extension payload must be 255bytes or less for RFC 5285 two byte extensions")]
    ErrRfc8285twoByteHeaderSize,
    #[error("header extension id must be 0 for none RFC 5285 extensions")]
    ErrRfc3550headerIdrange,
    #[error("packet is not large enough")]
    ErrShortPacket,
    #[error("invalid nil packet")]
    ErrNilPacket,
    #[error("padding size exceeds payload size")]
    ErrInvalidPadding,
    #[error("payload is not large enough")]
    PayloadIsNotLargeEnough,
    #[error("header extension payload must be in 32-bit words")]
    HeaderExtensionPayloadNot32BitWords,

    //SRTP
    #[error("duplicated packet")]
    ErrDuplicated,
    #[error("SRTP master key is not long enough")]
    ErrShortSrtpMasterKey,
    #[error("SRTP master salt is not long enough")]
    ErrShortSrtpMasterSalt,
    #[error("no such SRTP Profile")]
    ErrNoSuchSrtpProfile,
    #[error("indexOverKdr > 0 is not supported yet")]
    ErrNonZeroKdrNotSupported,
    #[error("exporter called with wrong label")]
    ErrExporterWrongLabel,
    #[error("no config provided")]
    ErrNoConfig,
    #[error("failed to verify auth tag")]
    ErrFailedToVerifyAuthTag,
    #[error("packet is too short to be rtp packet")]
    ErrTooShortRtp,
    #[error("packet is too short to be rtcp packet")]
    ErrTooShortRtcp,
    #[error("payload differs")]
    ErrPayloadDiffers,
    #[error("stream has not been inited, unable to close")]
    ErrStreamNotInited,
    #[error("SRTCP index wrapped, rekey required")]
    ErrSrtcpIndexExhausted,
    #[error("unsupported out length {0}")]
    UnsupportedOutLength(usize),
    #[error("SRTP Master Key must be len {0}, got {1}")]
    SrtpMasterKeyLength(usize, usize),
    #[error("SRTP Salt must be len {0}, got {1}")]
    SrtpSaltLength(usize, usize),
    #[error("srtp ssrc={0} index={1}: duplicated")]
    SrtpSsrcDuplicated(u32, u16),
    #[error("srtcp ssrc={0} index={1}: duplicated")]
    SrtcpSsrcDuplicated(u32, usize),
    #[error("{0} does not exist in srtp session")]
    SsrcMissingFromSrtp(u32),
    #[error("{0} does not exist in srtcp session")]
    SsrcMissingFromSrtcp(u32),
    #[error("too short SRTP packet: only {0} bytes, expected > {1} bytes")]
    SrtpTooSmall(usize, usize),
    #[error("too short SRTCP packet: only {0} bytes, expected > {1} bytes")]
    SrtcpTooSmall(usize, usize),
    #[error("failed to verify rtp auth tag")]
    RtpFailedToVerifyAuthTag,
    #[error("too short auth tag: only {0} bytes, expected > {1} bytes")]
    RtcpInvalidLengthAuthTag(usize, usize),
    #[error("failed to verify rtcp auth tag")]
    RtcpFailedToVerifyAuthTag,

    //STUN errors
    #[error("attribute not found")]
    ErrAttributeNotFound,
    #[error("transaction is stopped")]
    ErrTransactionStopped,
    #[error("transaction not exists")]
    ErrTransactionNotExists,
    #[error("transaction exists with same id")]
    ErrTransactionExists,
    #[error("agent is closed")]
    ErrAgentClosed,
    #[error("client is closed")]
    ErrClientClosed,
    #[error("transaction is timed out")]
    ErrTransactionTimeOut,
    #[error("no default reason for ErrorCode")]
    ErrNoDefaultReason,
    #[error("unexpected EOF")]
    ErrUnexpectedEof,
    #[error("attribute size is invalid")]
    ErrAttributeSizeInvalid,
    #[error("attribute size overflow")]
    ErrAttributeSizeOverflow,
    #[error("attempt to decode to nil message")]
    ErrDecodeToNil,
    #[error("unexpected EOF: not enough bytes to read header")]
    ErrUnexpectedHeaderEof,
    #[error("integrity check failed")]
    ErrIntegrityMismatch,
    #[error("fingerprint check failed")]
    ErrFingerprintMismatch,
    #[error("FINGERPRINT before MESSAGE-INTEGRITY attribute")]
    ErrFingerprintBeforeIntegrity,
    #[error("bad UNKNOWN-ATTRIBUTES size")]
    ErrBadUnknownAttrsSize,
    #[error("invalid length of IP value")]
    ErrBadIpLength,
    #[error("invalid magic cookie {0:#x}")]
    ErrInvalidMagicCookie(u32),
    #[error("buffer length {0} is less than {1} (expected message size)")]
    ErrBufferLengthLessThanMessageSize(usize, usize),
    #[error("unsupported network")]
    ErrUnsupportedNetwork,
    #[error("invalid url")]
    ErrInvalidUrl,
    #[error("unknown scheme type")]
    ErrSchemeType,
    #[error("invalid hostname")]
    ErrHost,

    // TURN errors
    #[error("turn: RelayAddress must be valid IP to use RelayAddressGeneratorStatic")]
    ErrRelayAddressInvalid,
    #[error("turn: max retries exceeded")]
    ErrMaxRetriesExceeded,
    #[error("all retransmissions failed")]
    ErrAllRetransmissionsFailed,
    #[error("no binding found for channel")]
    ErrChannelBindNotFound,
    #[error("STUN server address is not set for the client")]
    ErrStunserverAddressNotSet,
    #[error("only one Allocate() caller is allowed")]
    ErrOneAllocateOnly,
    #[error("already allocated")]
    ErrAlreadyAllocated,
    #[error("non-STUN message from STUN server")]
    ErrNonStunmessage,
    #[error("failed to decode STUN message")]
    ErrFailedToDecodeStun,
    #[error("unexpected STUN request message")]
    ErrUnexpectedStunrequestMessage,
    #[error("channel number not in [0x4000, 0x7FFF]")]
    ErrInvalidChannelNumber,
    #[error("channelData length != len(Data)")]
    ErrBadChannelDataLength,
    #[error("use of closed network connection")]
    ErrClosed,
    #[error("failed to build refresh request")]
    ErrFailedToBuildRefreshRequest,
    #[error("failed to refresh allocation")]
    ErrFailedToRefreshAllocation,
    #[error("failed to get lifetime from refresh response")]
    ErrFailedToGetLifetime,
    #[error("too short buffer")]
    ErrShortBuffer,
    #[error("unexpected response type")]
    ErrUnexpectedResponse,
    #[error("no permission")]
    ErrNoPermission,
    #[error("no allocation")]
    ErrNoAllocation,
    #[error("turn: {0}")]
    ErrTurnErrorResponse(String),

    // ICE errors
    /// Indicates an error with Unknown info.
    #[error("Unknown type")]
    ErrUnknownType,
    /// Indicates query arguments are provided in a STUN URL.
    #[error("queries not supported in stun address")]
    ErrStunQuery,
    /// Indicates an malformed query is provided.
    #[error("invalid query")]
    ErrInvalidQuery,
    /// Indicates malformed port is provided.
    #[error("invalid port")]
    ErrPort,
    /// Indicates local username fragment insufficient bits are provided.
    /// Have to be at least 24 bits long.
    #[error("local username fragment is less than 24 bits long")]
    ErrLocalUfragInsufficientBits,
    /// Indicates local passoword insufficient bits are provided.
    /// Have to be at least 128 bits long.
    #[error("local password is less than 128 bits long")]
    ErrLocalPwdInsufficientBits,
    /// Indicates an unsupported transport type was provided.
    #[error("invalid transport protocol type")]
    ErrProtoType,
    /// Indicates agent does not have a valid candidate pair.
    #[error("no candidate pairs available")]
    ErrNoCandidatePairs,
    #[error("no remote candidates before timeout")]
    ErrNoRemoteCandidates,
    #[error("all candidate pairs failed")]
    ErrAllPairsFailed,
    #[error("ICE restart aborted")]
    ErrIceRestartAborted,
    /// Indicates agent connection was canceled by the caller.
    #[error("connecting canceled by caller")]
    ErrCanceledByCaller,
    /// Indicates agent was started twice.
    #[error("attempted to start agent twice")]
    ErrMultipleStart,
    /// Indicates agent was started with an empty remote ufrag.
    #[error("remote ufrag is empty")]
    ErrRemoteUfragEmpty,
    /// Indicates agent was started with an empty remote pwd.
    #[error("remote pwd is empty")]
    ErrRemotePwdEmpty,
    /// Indicates GatherCandidates has been called multiple times.
    #[error("attempting to gather candidates during gathering state")]
    ErrMultipleGatherAttempted,
    /// Indicates agent was give TURN URL with an empty Username.
    #[error("username is empty")]
    ErrUsernameEmpty,
    /// Indicates agent was give TURN URL with an empty Password.
    #[error("password is empty")]
    ErrPasswordEmpty,
    /// Indicates we were unable to parse a candidate address.
    #[error("failed to parse address")]
    ErrAddressParseFailed,
    /// Indicates that non host candidates were selected for a lite agent.
    #[error("lite agents must only use host candidates")]
    ErrLiteUsingNonHostCandidates,
    /// Indicates that one or more URL was provided to the agent but no host candidate required them.
    #[error("agent does not need URL with selected candidate types")]
    ErrUselessUrlsProvided,
    /// Indicates that the specified NAT1To1IPCandidateType is unsupported.
    #[error("unsupported 1:1 NAT IP candidate type")]
    ErrUnsupportedNat1to1IpCandidateType,
    /// Indicates that the given 1:1 NAT IP mapping is invalid.
    #[error("invalid 1:1 NAT IP mapping")]
    ErrInvalidNat1to1IpMapping,
    /// Indicates Restart was called when Agent is in GatheringStateGathering.
    #[error("ICE Agent can not be restarted when gathering")]
    ErrRestartWhenGathering,
    #[error("failed to send packet")]
    ErrSendPacket,
    #[error("attribute not long enough to be ICE candidate")]
    ErrAttributeTooShortIceCandidate,
    #[error("could not parse component")]
    ErrParseComponent,
    #[error("could not parse priority")]
    ErrParsePriority,
    #[error("could not parse port")]
    ErrParsePort,
    #[error("could not parse related addresses")]
    ErrParseRelatedAddr,
    #[error("could not parse type")]
    ErrParseType,
    #[error("unknown candidate type")]
    ErrUnknownCandidateType,
    #[error("failed to get XOR-MAPPED-ADDRESS response")]
    ErrGetXorMappedAddrResponse,
    #[error("connection with same remote address already exists")]
    ErrConnectionAddrAlreadyExist,
    #[error("error writing to")]
    ErrWriting,
    #[error("unable to determine networkType")]
    ErrDetermineNetworkType,
    #[error("missing protocol scheme")]
    ErrMissingProtocolScheme,
    #[error("too many colons in address")]
    ErrTooManyColonsAddr,
    #[error("unknown role")]
    ErrUnknownRole,
    #[error("username mismatch")]
    ErrMismatchUsername,
    #[error("the ICE conn can't write STUN messages")]
    ErrIceWriteStunMessage,
    #[error("url parse error")]
    ErrUrlParse,
    #[error("role conflict")]
    ErrRoleConflict,
    #[error("candidate ip not found")]
    ErrCandidateIpNotFound,

    //DTLS errors
    #[error("conn is closed")]
    ErrConnClosed,
    #[error("read/write timeout")]
    ErrDeadlineExceeded,
    #[error("buffer is too small")]
    ErrDtlspacketInvalidLength,
    #[error("handshake is in progress")]
    ErrHandshakeInProgress,
    #[error("handshake timed out")]
    ErrHandshakeTimeout,
    #[error("invalid content type")]
    ErrInvalidContentType,
    #[error("invalid mac")]
    ErrInvalidMac,
    #[error("packet length and declared length do not match")]
    ErrInvalidPacketLength,
    #[error("certificate_verify message has no certificate")]
    ErrCertificateVerifyNoCertificate,
    #[error("client+server do not support any shared cipher suites")]
    ErrCipherSuiteNoIntersection,
    #[error("server hello can not be created without a cipher suite")]
    ErrCipherSuiteUnset,
    #[error("client sent certificate but did not verify it")]
    ErrClientCertificateNotVerified,
    #[error("server required client verification, but got none")]
    ErrClientCertificateRequired,
    #[error("server responded with SRTP Profile we do not support")]
    ErrClientNoMatchingSrtpProfile,
    #[error("client required Extended Master Secret extension, but server does not support it")]
    ErrClientRequiredButNoServerEms,
    #[error("server hello can not be created without a compression method")]
    ErrCompressionMethodUnset,
    #[error("client+server cookie does not match")]
    ErrCookieMismatch,
    #[error("cookie must not be longer then 255 bytes")]
    ErrCookieTooLong,
    #[error("certificate is invalid")]
    ErrInvalidCertificate,
    #[error("cipher spec invalid")]
    ErrInvalidCipherSpec,
    #[error("invalid or unknown cipher suite")]
    ErrInvalidCipherSuite,
    #[error("unable to determine if ClientKeyExchange is a public key or PSK Identity")]
    ErrInvalidClientKeyExchange,
    #[error("invalid or unknown compression method")]
    ErrInvalidCompressionMethod,
    #[error("ECDSA signature contained zero or negative values")]
    ErrInvalidEcdsasignature,
    #[error("invalid or unknown elliptic curve type")]
    ErrInvalidEllipticCurveType,
    #[error("invalid extension type")]
    ErrInvalidExtensionType,
    #[error("invalid hash algorithm")]
    ErrInvalidHashAlgorithm,
    #[error("invalid named curve")]
    ErrInvalidNamedCurve,
    #[error("invalid private key type")]
    ErrInvalidPrivateKey,
    #[error("invalid signature algorithm")]
    ErrInvalidSignatureAlgorithm,
    #[error("expected and actual key signature do not match")]
    ErrKeySignatureMismatch,
    #[error("connection can not be created, no CipherSuites satisfy this Config")]
    ErrNoAvailableCipherSuites,
    #[error("connection can not be created, no SignatureScheme satisfy this Config")]
    ErrNoAvailableSignatureSchemes,
    #[error("no certificates configured")]
    ErrNoCertificates,
    #[error("no config provided")]
    ErrNoConfigProvided,
    #[error("client requested zero or more elliptic curves that are not supported by the server")]
    ErrNoSupportedEllipticCurves,
    #[error("unsupported protocol version")]
    ErrUnsupportedProtocolVersion,
    #[error("SRTP support was requested but server did not respond with use_srtp extension")]
    ErrRequestedButNoSrtpExtension,
    #[error("Certificate is mandatory for server")]
    ErrServerMustHaveCertificate,
    #[error("client requested SRTP but we have no matching profiles")]
    ErrServerNoMatchingSrtpProfile,
    #[error("server requires the Extended Master Secret extension, but the client does not support it")]
    ErrServerRequiredButNoClientEms,
    #[error("expected and actual verify data does not match")]
    ErrVerifyDataMismatch,
    #[error("handshake message unset, unable to marshal")]
    ErrHandshakeMessageUnset,
    #[error("invalid flight number")]
    ErrInvalidFlight,
    #[error("unable to generate key signature, unimplemented")]
    ErrKeySignatureGenerateUnimplemented,
    #[error("unable to verify key signature, unimplemented")]
    ErrKeySignatureVerifyUnimplemented,
    #[error("data length and declared length do not match")]
    ErrLengthMismatch,
    #[error("buffer not long enough to contain nonce")]
    ErrNotEnoughRoomForNonce,
    #[error("feature has not been implemented yet")]
    ErrNotImplemented,
    #[error("sequence number overflow")]
    ErrSequenceNumberOverflow,
    #[error("unable to marshal fragmented handshakes")]
    ErrUnableToMarshalFragmented,
    #[error("invalid state machine transition")]
    ErrInvalidFsmTransition,
    #[error("ApplicationData with epoch of 0")]
    ErrApplicationDataEpochZero,
    #[error("unhandled contentType")]
    ErrUnhandledContextType,
    #[error("Alert is Fatal or Close Notify")]
    ErrAlertFatalOrClose,
    #[error("peer sent alert: {0}")]
    ErrAlert(String),
    #[error("fragment buffer overflow")]
    ErrFragmentBufferOverflow,
    #[error("empty fragment")]
    ErrEmptyFragment,
    #[error("invalid server name format")]
    ErrInvalidSniFormat,
    #[error("no connection for remote address {0}")]
    InvalidRemoteAddress(net::SocketAddr),
    #[error("endpoint has no server config to accept {0}")]
    NoServerConfig(net::SocketAddr),

    //SCTP errors
    #[error("raw is too small for a SCTP chunk")]
    ErrChunkHeaderTooSmall,
    #[error("not enough data left in SCTP packet to satisfy requested length")]
    ErrChunkHeaderNotEnoughSpace,
    #[error("chunk PADDING is non-zero at offset")]
    ErrChunkHeaderPaddingNonZero,
    #[error("chunk has invalid length")]
    ErrChunkHeaderInvalidLength,
    #[error("ChunkType is not of type ABORT")]
    ErrChunkTypeNotAbort,
    #[error("ChunkType is not of type COOKIEACK")]
    ErrChunkTypeNotCookieAck,
    #[error("ChunkType is not of type COOKIEECHO")]
    ErrChunkTypeNotCookieEcho,
    #[error("ChunkType is not of type ctsn")]
    ErrChunkTypeNotCt,
    #[error("unable to be popped from inflight queue TSN")]
    ErrInflightQueueTsnPop,
    #[error("chunk too short")]
    ErrChunkTooShort,
    #[error("ChunkType is not of type ForwardTsn")]
    ErrChunkTypeNotForwardTsn,
    #[error("ChunkType is not of type HEARTBEAT")]
    ErrChunkTypeNotHeartbeat,
    #[error("ChunkType is not of type HEARTBEATACK")]
    ErrChunkTypeNotHeartbeatAck,
    #[error("heartbeat is not long enough to contain Heartbeat Info")]
    ErrHeartbeatNotLongEnoughInfo,
    #[error("failed to parse param type")]
    ErrParseParamTypeFailed,
    #[error("heartbeat should only have HEARTBEAT param")]
    ErrHeartbeatParam,
    #[error("heartbeat Ack must have one param")]
    ErrHeartbeatAckParams,
    #[error("heartbeat Ack must have one param, and it should be a HeartbeatInfo")]
    ErrHeartbeatAckNotHeartbeatInfo,
    #[error("raw is too small for error cause")]
    ErrErrorCauseTooSmall,
    #[error("unhandled ParamType `{typ}`")]
    ErrParamTypeUnhandled { typ: u16 },
    #[error("unexpected ParamType")]
    ErrParamTypeUnexpected,
    #[error("param header too short")]
    ErrParamHeaderTooShort,
    #[error("param self reported length is shorter than header length")]
    ErrParamHeaderSelfReportedLengthShorter,
    #[error("param self reported length is longer than header length")]
    ErrParamHeaderSelfReportedLengthLonger,
    #[error("failed to parse param type")]
    ErrParamHeaderParseFailed,
    #[error("packet to short")]
    ErrParamPacketTooShort,
    #[error("outgoing SSN reset request parameter too short")]
    ErrSsnResetRequestParamTooShort,
    #[error("reconfig response parameter too short")]
    ErrReconfigRespParamTooShort,
    #[error("invalid algorithm type")]
    ErrInvalidAlgorithmType,
    #[error("failed to parse param type")]
    ErrInitChunkParseParamTypeFailed,
    #[error("ChunkType is not of type INIT")]
    ErrChunkTypeNotTypeInit,
    #[error("chunk Value isn't long enough for mandatory parameters exp")]
    ErrChunkValueNotLongEnough,
    #[error("ChunkType of type INIT flags must be all 0")]
    ErrChunkTypeInitFlagZero,
    #[error("ChunkType of type INIT ACK InitiateTag must not be 0")]
    ErrChunkTypeInitInitiateTagZero,
    #[error("INIT ACK inbound stream request must be > 0")]
    ErrInitInboundStreamRequestZero,
    #[error("INIT ACK outbound stream request must be > 0")]
    ErrInitOutboundStreamRequestZero,
    #[error("INIT ACK Advertised Receiver Window Credit (a_rwnd) must be >= 1500")]
    ErrInitAdvertisedReceiver1500,
    #[error("packet is smaller than the header size")]
    ErrChunkPayloadSmall,
    #[error("ChunkType is not of type PayloadData")]
    ErrChunkTypeNotPayloadData,
    #[error("ChunkType is not of type Reconfig")]
    ErrChunkTypeNotReconfig,
    #[error("ChunkReconfig has invalid ParamA")]
    ErrChunkReconfigInvalidParamA,
    #[error("ChunkType is not of type SACK")]
    ErrChunkTypeNotSack,
    #[error("SACK Chunk size is not large enough to contain header")]
    ErrSackSizeNotLargeEnoughInfo,
    #[error("invalid chunk size")]
    ErrInvalidChunkSize,
    #[error("ChunkType is not of type SHUTDOWN")]
    ErrChunkTypeNotShutdown,
    #[error("ChunkType is not of type SHUTDOWN-ACK")]
    ErrChunkTypeNotShutdownAck,
    #[error("ChunkType is not of type SHUTDOWN-COMPLETE")]
    ErrChunkTypeNotShutdownComplete,
    #[error("raw is smaller than the minimum length for a SCTP packet")]
    ErrPacketRawTooSmall,
    #[error("unable to parse SCTP chunk, not enough data for complete header")]
    ErrParseSctpChunkNotEnoughData,
    #[error("failed to unmarshal, contains unknown chunk type")]
    ErrUnmarshalUnknownChunkType,
    #[error("checksum mismatch theirs")]
    ErrChecksumMismatch,
    #[error("try again")]
    ErrTryAgain,
    #[error("abort chunk, with following errors: {0}")]
    ErrAbortChunk(String),
    #[error("shutdown called in non-Established state")]
    ErrShutdownNonEstablished,
    #[error("association closed before connecting")]
    ErrAssociationClosedBeforeConn,
    #[error("silently discard")]
    ErrSilentlyDiscard,
    #[error("the init not stored to send")]
    ErrInitNotStoredToSend,
    #[error("cookieEcho not stored to send")]
    ErrCookieEchoNotStoredToSend,
    #[error("sctp packet must not have a source port of 0")]
    ErrSctpPacketSourcePortZero,
    #[error("sctp packet must not have a destination port of 0")]
    ErrSctpPacketDestinationPortZero,
    #[error("init chunk must not be bundled with any other chunk")]
    ErrInitChunkBundled,
    #[error("init chunk expects a verification tag of 0 on the packet when out-of-the-blue")]
    ErrInitChunkVerifyTagNotZero,
    #[error("todo: handle Init when in state")]
    ErrHandleInitState,
    #[error("no cookie in InitAck")]
    ErrInitAckNoCookie,
    #[error("there already exists a stream with identifier")]
    ErrStreamAlreadyExist,
    #[error("failed to create a stream with identifier")]
    ErrStreamCreateFailed,
    #[error("unable to be popped from inflight queue TSN")]
    ErrTsnRequestNotExist,
    #[error("sending reset packet in non-Established state")]
    ErrResetPacketInStateNotExist,
    #[error("unexpected parameter type")]
    ErrParameterType,
    #[error("sending payload data in non-Established state")]
    ErrPayloadDataStateNotExist,
    #[error("unhandled chunk type")]
    ErrChunkTypeUnhandled,
    #[error("handshake failed (INIT ACK)")]
    ErrHandshakeInitAck,
    #[error("handshake failed (COOKIE ECHO)")]
    ErrHandshakeCookieEcho,
    #[error("outbound packet larger than maximum message size")]
    ErrOutboundPacketTooLarge,
    #[error("Stream closed")]
    ErrStreamClosed,
    #[error("Stream not existed")]
    ErrStreamNotExisted,
    #[error("Association not existed")]
    ErrAssociationNotExisted,
    #[error("Eof")]
    ErrEof,
    #[error("buffered amount {0} exceeds limit {1}")]
    ErrBufferedAmountExceeded(usize, usize),

    //Data Channel
    #[error("Maximum number ID for datachannel specified")]
    ErrMaxDataChannelID,
    #[error(
        "DataChannel message is not long enough to determine type: (expected: {expected}, actual: {actual})"
    )]
    UnexpectedEndOfBuffer { expected: usize, actual: usize },
    #[error("Unknown MessageType {0}")]
    InvalidMessageType(u8),
    #[error("Unknown ChannelType {0}")]
    InvalidChannelType(u8),
    #[error("Unknown PayloadProtocolIdentifier {0}")]
    InvalidPayloadProtocolIdentifier(u8),

    //RTC errors
    /// ErrConnectionClosed indicates an operation executed after connection
    /// has already been closed.
    #[error("connection closed")]
    ErrConnectionClosed,

    /// ErrDataChannelClosed indicates an operation executed when the data
    /// channel is not (yet) open or closed.
    #[error("data channel closed")]
    ErrDataChannelClosed,

    #[error("data channel not existed")]
    ErrDataChannelNotExisted,

    /// ErrCertificateExpired indicates that an x509 certificate has expired.
    #[error("x509Cert expired")]
    ErrCertificateExpired,

    /// ErrNoTurnCredentials indicates that a TURN server URL was provided
    /// without required credentials.
    #[error("turn server credentials required")]
    ErrNoTurnCredentials,

    /// ErrTurnCredentials indicates that provided TURN credentials are partial
    /// or malformed.
    #[error("invalid turn server credentials")]
    ErrTurnCredentials,

    /// ErrExistingTrack indicates that a track already exists.
    #[error("track already exists")]
    ErrExistingTrack,

    /// ErrPrivateKeyType indicates that a particular private key encryption
    /// chosen to generate a certificate is not supported.
    #[error("private key type not supported")]
    ErrPrivateKeyType,

    /// ErrModifyingPeerIdentity indicates that an attempt to modify
    /// PeerIdentity was made after PeerConnection has been initialized.
    #[error("peerIdentity cannot be modified")]
    ErrModifyingPeerIdentity,

    /// ErrModifyingCertificates indicates that an attempt to modify
    /// Certificates was made after PeerConnection has been initialized.
    #[error("certificates cannot be modified")]
    ErrModifyingCertificates,

    #[error("bundle policy cannot be modified")]
    ErrModifyingBundlePolicy,

    #[error("rtcp mux policy cannot be modified")]
    ErrModifyingRTCPMuxPolicy,

    #[error("ice candidate pool size cannot be modified")]
    ErrModifyingICECandidatePoolSize,

    /// ErrStringSizeLimit indicates that the character size limit of string is
    /// exceeded. The limit is hardcoded to 65535 according to specifications.
    #[error("data channel label exceeds size limit")]
    ErrStringSizeLimit,

    /// ErrNegotiatedWithoutID indicates that an attempt to create a data channel
    /// was made while setting the negotiated option to true without providing
    /// the negotiated channel ID.
    #[error("negotiated set without channel id")]
    ErrNegotiatedWithoutID,

    /// ErrRetransmitsOrPacketLifeTime indicates that an attempt to create a data
    /// channel was made with both options max_packet_life_time and max_retransmits
    /// set together.
    #[error("both max_packet_life_time and max_retransmits was set")]
    ErrRetransmitsOrPacketLifeTime,

    /// ErrCodecNotFound is returned when a codec search to the Media Engine fails
    #[error("codec not found")]
    ErrCodecNotFound,

    /// ErrNoRemoteDescription indicates that an operation was rejected because
    /// the remote description is not set
    #[error("remote description is not set")]
    ErrNoRemoteDescription,

    /// ErrIncorrectSignalingState indicates that the signaling state of PeerConnection is not correct
    #[error("operation can not be run in current signaling state")]
    ErrIncorrectSignalingState,

    /// ErrProtocolTooLarge indicates that value given for a DataChannelInit protocol is
    /// longer then 65535 bytes
    #[error("protocol is larger then 65535 bytes")]
    ErrProtocolTooLarge,

    /// ErrSenderNotCreatedByConnection indicates remove_track was called with a RtpSender not created
    /// by this PeerConnection
    #[error("RtpSender not created by this PeerConnection")]
    ErrSenderNotCreatedByConnection,

    /// ErrSessionDescriptionNoFingerprint indicates set_remote_description was called with a SessionDescription that has no
    /// fingerprint
    #[error("set_remote_description called with no fingerprint")]
    ErrSessionDescriptionNoFingerprint,

    /// ErrSessionDescriptionInvalidFingerprint indicates set_remote_description was called with a SessionDescription that
    /// has an invalid fingerprint
    #[error("set_remote_description called with an invalid fingerprint")]
    ErrSessionDescriptionInvalidFingerprint,

    /// ErrSessionDescriptionConflictingFingerprints indicates set_remote_description was called with a SessionDescription that
    /// has an conflicting fingerprints
    #[error("set_remote_description called with multiple conflicting fingerprint")]
    ErrSessionDescriptionConflictingFingerprints,

    /// ErrSessionDescriptionMissingIceUfrag indicates set_remote_description was called with a SessionDescription that
    /// is missing an ice-ufrag value
    #[error("set_remote_description called with no ice-ufrag")]
    ErrSessionDescriptionMissingIceUfrag,

    /// ErrSessionDescriptionMissingIcePwd indicates set_remote_description was called with a SessionDescription that
    /// is missing an ice-pwd value
    #[error("set_remote_description called with no ice-pwd")]
    ErrSessionDescriptionMissingIcePwd,

    /// ErrSessionDescriptionConflictingIceUfrag  indicates set_remote_description was called with a SessionDescription that
    /// contains multiple conflicting ice-ufrag values
    #[error("set_remote_description called with multiple conflicting ice-ufrag values")]
    ErrSessionDescriptionConflictingIceUfrag,

    /// ErrSessionDescriptionConflictingIcePwd indicates set_remote_description was called with a SessionDescription that
    /// contains multiple conflicting ice-pwd values
    #[error("set_remote_description called with multiple conflicting ice-pwd values")]
    ErrSessionDescriptionConflictingIcePwd,

    #[error("set_remote_description called with conflicting setup roles")]
    ErrSessionDescriptionConflictingSetupRole,

    /// ErrNoSRTPProtectionProfile indicates that the DTLS handshake completed and no SRTP Protection Profile was chosen
    #[error("DTLS Handshake completed and no SRTP Protection Profile was chosen")]
    ErrNoSRTPProtectionProfile,

    /// ErrFailedToGenerateCertificateFingerprint indicates that we failed to generate the fingerprint used for comparing certificates
    #[error("failed to generate certificate fingerprint")]
    ErrFailedToGenerateCertificateFingerprint,

    /// ErrNoCodecsAvailable indicates that operation isn't possible because the MediaEngine has no codecs available
    #[error("operation failed no codecs are available")]
    ErrNoCodecsAvailable,

    /// ErrUnsupportedCodec indicates the remote peer doesn't support the requested codec
    #[error("unable to start track, codec is not supported by remote")]
    ErrUnsupportedCodec,

    /// ErrSenderWithNoCodecs indicates that a RTPSender was created without any codecs.
    #[error("unable to populate media section, RTPSender created with no codecs")]
    ErrSenderWithNoCodecs,

    /// ErrRTPSenderNewTrackHasIncorrectKind indicates that the new track is of a different kind than the previous/original
    #[error("new track must be of the same kind as previous")]
    ErrRTPSenderNewTrackHasIncorrectKind,

    /// ErrUnbindFailed indicates that a TrackLocal was not able to be unbind
    #[error("failed to unbind TrackLocal from PeerConnection")]
    ErrUnbindFailed,

    /// ErrNoPayloaderForCodec indicates that the requested codec does not have a payloader
    #[error("the requested codec does not have a payloader")]
    ErrNoPayloaderForCodec,

    /// ErrRegisterHeaderExtensionInvalidDirection indicates that a extension was registered with a direction besides `sendonly` or `recvonly`
    #[error("a header extension must be registered as 'recvonly', 'sendonly' or both")]
    ErrRegisterHeaderExtensionInvalidDirection,

    /// ErrRegisterHeaderExtensionNoFreeID indicates that there was no extension ID available which
    /// in turn means that all 15 available id(1 through 14) have been used.
    #[error("no header extension ID was free to use(this means the maximum of 15 extensions have been registered)")]
    ErrRegisterHeaderExtensionNoFreeID,

    #[error("the DTLS transport has not started yet")]
    ErrDtlsTransportNotStarted,

    /// ErrDtlsKeyExtractionFailed indicates that extracting keys from DTLS for use by SRTP failed
    #[error("failed extracting keys from DTLS for SRTP")]
    ErrDtlsKeyExtractionFailed,

    /// ErrFailedToStartSRTP indicates that starting the SRTP session failed
    #[error("failed to start SRTP")]
    ErrFailedToStartSRTP,

    /// ErrFailedToStartSRTCP indicates that starting the SRTCP session failed
    #[error("failed to start SRTCP")]
    ErrFailedToStartSRTCP,

    /// ErrInvalidDTLSStart indicates that DTLSTransport.Start() was called with invalid parameters
    #[error("attempted to start DTLSTransport that is not in new state")]
    ErrInvalidDTLSStart,

    /// ErrNoRemoteCertificate indicates that the remote DTLS certificate was not provided
    #[error("peer didn't provide certificate via DTLS")]
    ErrNoRemoteCertificate,

    /// ErrNoMatchingCertificateFingerprint indicates that the remote certificate fingerprint
    /// did not match any advertised in the session description
    #[error("no matching fingerprint")]
    ErrNoMatchingCertificateFingerprint,

    /// ErrUnsupportedFingerprintAlgorithm indicates that the remote fingerprint algorithm is not supported
    #[error("unsupported fingerprint algorithm")]
    ErrUnsupportedFingerprintAlgorithm,

    #[error("ICE connection not started")]
    ErrICEConnectionNotStarted,

    #[error("unknown candidate type")]
    ErrICECandidateTypeUnknown,

    #[error("cannot convert ice.CandidateType into webrtc.ICECandidateType, invalid type")]
    ErrICEInvalidConvertCandidateType,

    #[error("ICEAgent does not exist")]
    ErrICEAgentNotExist,

    #[error("unable to convert ICE candidates to ICECandidates")]
    ErrICECandidatesConversionFailed,

    #[error("unknown ICE Role")]
    ErrICERoleUnknown,

    #[error("unknown protocol")]
    ErrICEProtocolUnknown,

    #[error("gatherer not started")]
    ErrICEGathererNotStarted,

    #[error("unknown network type")]
    ErrNetworkTypeUnknown,

    /// ErrSDPDoesNotMatchOffer indicates that a local description was set that does not match the last created offer
    #[error("new sdp does not match previous offer")]
    ErrSDPDoesNotMatchOffer,

    /// ErrSDPDoesNotMatchAnswer indicates that a local description was set that does not match the last created answer
    #[error("new sdp does not match previous answer")]
    ErrSDPDoesNotMatchAnswer,

    #[error("provided value is not a valid enum value of type SDPType")]
    ErrPeerConnSDPTypeInvalidValue,

    #[error("invalid state change op")]
    ErrPeerConnStateChangeInvalid,

    #[error("unhandled state change op")]
    ErrPeerConnStateChangeUnhandled,

    #[error("invalid SDP type supplied to SetLocalDescription()")]
    ErrPeerConnSDPTypeInvalidValueSetLocalDescription,

    #[error("remoteDescription contained media section without mid value")]
    ErrPeerConnRemoteDescriptionWithoutMidValue,

    #[error("remoteDescription has not been set yet")]
    ErrPeerConnRemoteDescriptionNil,

    #[error("localDescription has not been set yet")]
    ErrPeerConnLocalDescriptionNil,

    #[error("single media section has an explicit SSRC")]
    ErrPeerConnSingleMediaSectionHasExplicitSSRC,

    #[error("could not add transceiver for remote SSRC")]
    ErrPeerConnRemoteSSRCAddTransceiver,

    #[error("AddTransceiverFromKind only accepts one RTPTransceiverInit")]
    ErrPeerConnAddTransceiverFromKindOnlyAcceptsOne,

    #[error("AddTransceiverFromTrack only accepts one RTPTransceiverInit")]
    ErrPeerConnAddTransceiverFromTrackOnlyAcceptsOne,

    #[error("AddTransceiverFromKind needs an audio or video kind")]
    ErrPeerConnAddTransceiverFromKindSupport,

    #[error("AddTransceiverFromTrack currently only supports sendonly and sendrecv")]
    ErrPeerConnAddTransceiverFromTrackSupport,

    #[error("transceiver not existed")]
    ErrRTPTransceiverNotExisted,

    #[error("Track must not be nil")]
    ErrRTPSenderTrackNil,

    #[error("Sender has already been stopped")]
    ErrRTPSenderStopped,

    #[error("Receiver has already been stopped")]
    ErrRTPReceiverStopped,

    #[error("Sender cannot add encoding as rid is empty")]
    ErrRTPSenderRidNil,

    #[error("RTPReceiver must not be nil")]
    ErrRTPReceiverNil,

    #[error("RTPSender must not be nil")]
    ErrRTPSenderNil,

    #[error("Track not existed")]
    ErrTrackNotExisted,

    #[error("errRTPTransceiverCannotChangeMid")]
    ErrRTPTransceiverCannotChangeMid,

    #[error("invalid state change in RTPTransceiver.setSending")]
    ErrRTPTransceiverSetSendingInvalidState,

    #[error("unsupported codec type by this transceiver")]
    ErrRTPTransceiverCodecUnsupported,

    #[error("DTLS not established")]
    ErrSCTPTransportDTLS,

    #[error("SCTP not established")]
    ErrSCTPNotEstablished,

    #[error("add_transceiver_sdp() called with 0 transceivers")]
    ErrSDPZeroTransceivers,

    #[error("invalid Media Section. Media + DataChannel both enabled")]
    ErrSDPMediaSectionMediaDataChanInvalid,

    #[error("invalid Media Section. Can not have multiple tracks in one MediaSection in UnifiedPlan")]
    ErrSDPMediaSectionMultipleTrackInvalid,

    #[error("set_answering_dtls_role must DTLSRoleClient or DTLSRoleServer")]
    ErrSettingEngineSetAnsweringDTLSRole,

    #[error("can't rollback from stable state")]
    ErrSignalingStateCannotRollback,

    #[error("invalid proposed signaling state transition from {from} applying {is_local} {applying}")]
    ErrSignalingStateProposedTransitionInvalid {
        from: String,
        applying: String,
        is_local: bool,
    },

    #[error("cannot convert to StatsICECandidatePairStateSucceeded invalid ice candidate state")]
    ErrStatsICECandidateStateInvalid,

    #[error("ICETransport can only be called in ICETransportStateNew")]
    ErrICETransportNotInNew,

    #[error("bad Certificate PEM format")]
    ErrCertificatePEMFormatError,

    #[error("interceptor is not bind")]
    ErrInterceptorNotBind,

    #[error("excessive retries in CreateOffer")]
    ErrExcessiveRetries,

    //SDP
    #[error("codec not found")]
    CodecNotFound,
    #[error("missing whitespace")]
    MissingWhitespace,
    #[error("missing colon")]
    MissingColon,
    #[error("payload type not found")]
    PayloadTypeNotFound,
    #[error("SdpInvalidSyntax: {0}")]
    SdpInvalidSyntax(String),
    #[error("SdpInvalidValue: {0}")]
    SdpInvalidValue(String),
    #[error("sdp: empty time_descriptions")]
    SdpEmptyTimeDescription,
    #[error("parse extmap: {0}")]
    ParseExtMap(String),
    #[error("syntax error at {p}: {s}")]
    SyntaxError { s: String, p: usize },

    //Third Party Error
    #[error("{0}")]
    P256(#[source] P256Error),
    #[error("{0}")]
    RcGen(#[from] rcgen::Error),
    #[error("invalid PEM: {0}")]
    InvalidPEM(String),
    #[error("aes gcm: {0}")]
    AesGcm(#[from] aes_gcm::Error),
    #[error("parse ip: {0}")]
    ParseIp(#[from] net::AddrParseError),
    #[error("parse int: {0}")]
    ParseInt(#[from] ParseIntError),
    #[error("{0}")]
    Io(#[source] IoError),
    #[error("url parse: {0}")]
    Url(#[from] url::ParseError),
    #[error("utf8: {0}")]
    Utf8(#[from] FromUtf8Error),
    #[error("{0}")]
    Std(#[source] StdError),

    //Other Errors
    #[error("Other RTCP Err: {0}")]
    OtherRtcpErr(String),
    #[error("Other RTP Err: {0}")]
    OtherRtpErr(String),
    #[error("Other SRTP Err: {0}")]
    OtherSrtpErr(String),
    #[error("Other STUN Err: {0}")]
    OtherStunErr(String),
    #[error("Other TURN Err: {0}")]
    OtherTurnErr(String),
    #[error("Other ICE Err: {0}")]
    OtherIceErr(String),
    #[error("Other DTLS Err: {0}")]
    OtherDtlsErr(String),
    #[error("Other SCTP Err: {0}")]
    OtherSctpErr(String),
    #[error("Other DataChannel Err: {0}")]
    OtherDataChannelErr(String),
    #[error("Other Interceptor Err: {0}")]
    OtherInterceptorErr(String),
    #[error("Other SDP Err: {0}")]
    OtherSdpErr(String),
    #[error("Other PeerConnection Err: {0}")]
    OtherPeerConnectionErr(String),
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn from_std<T>(error: T) -> Self
    where
        T: std::error::Error + Send + Sync + 'static,
    {
        Error::Std(StdError(Box::new(error)))
    }

    pub fn downcast_ref<T: std::error::Error + 'static>(&self) -> Option<&T> {
        if let Error::Std(s) = self {
            return s.0.downcast_ref();
        }

        None
    }

    /// Classifies the error into one of the [`ErrorKind`]s surfaced to applications.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ErrIncorrectSignalingState
            | Error::ErrSignalingStateCannotRollback
            | Error::ErrSignalingStateProposedTransitionInvalid { .. }
            | Error::ErrPeerConnStateChangeInvalid
            | Error::ErrPeerConnStateChangeUnhandled
            | Error::ErrPeerConnRemoteDescriptionNil
            | Error::ErrPeerConnLocalDescriptionNil
            | Error::ErrNoRemoteDescription
            | Error::ErrSDPDoesNotMatchOffer
            | Error::ErrSDPDoesNotMatchAnswer
            | Error::ErrInvalidDTLSStart
            | Error::ErrICETransportNotInNew
            | Error::ErrMultipleStart
            | Error::ErrMultipleGatherAttempted
            | Error::ErrRestartWhenGathering
            | Error::ErrHandshakeInProgress
            | Error::HandshakeInProgress
            | Error::ErrShutdownNonEstablished
            | Error::ErrPayloadDataStateNotExist
            | Error::ErrResetPacketInStateNotExist
            | Error::ErrModifyingCertificates
            | Error::ErrModifyingBundlePolicy
            | Error::ErrModifyingRTCPMuxPolicy
            | Error::ErrModifyingICECandidatePoolSize
            | Error::ErrModifyingPeerIdentity
            | Error::ErrDtlsTransportNotStarted
            | Error::ErrRTPSenderStopped
            | Error::ErrRTPReceiverStopped
            | Error::ErrRTPTransceiverSetSendingInvalidState
            | Error::ErrRTPTransceiverCannotChangeMid => ErrorKind::InvalidState,

            Error::ErrSessionDescriptionNoFingerprint
            | Error::ErrSessionDescriptionInvalidFingerprint
            | Error::ErrSessionDescriptionConflictingFingerprints
            | Error::ErrSessionDescriptionMissingIceUfrag
            | Error::ErrSessionDescriptionMissingIcePwd
            | Error::ErrSessionDescriptionConflictingIceUfrag
            | Error::ErrSessionDescriptionConflictingIcePwd
            | Error::ErrSessionDescriptionConflictingSetupRole
            | Error::ErrPeerConnRemoteDescriptionWithoutMidValue
            | Error::ErrPeerConnSDPTypeInvalidValue
            | Error::ErrPeerConnSDPTypeInvalidValueSetLocalDescription
            | Error::ErrPeerConnSingleMediaSectionHasExplicitSSRC
            | Error::ErrSDPZeroTransceivers
            | Error::ErrSDPMediaSectionMediaDataChanInvalid
            | Error::ErrSDPMediaSectionMultipleTrackInvalid
            | Error::SdpInvalidSyntax(_)
            | Error::SdpInvalidValue(_)
            | Error::SdpEmptyTimeDescription
            | Error::ParseExtMap(_)
            | Error::SyntaxError { .. }
            | Error::MissingWhitespace
            | Error::MissingColon
            | Error::OtherSdpErr(_) => ErrorKind::InvalidSdp,

            Error::ErrNoMatchingCertificateFingerprint => ErrorKind::FingerprintMismatch,

            Error::ErrNoRemoteCandidates => ErrorKind::IceFailure(IceFailureReason::NoRemoteCandidates),
            Error::ErrAllPairsFailed | Error::ErrNoCandidatePairs => {
                ErrorKind::IceFailure(IceFailureReason::AllPairsFailed)
            }
            Error::ErrIceRestartAborted => ErrorKind::IceFailure(IceFailureReason::RestartAborted),

            Error::ErrAlertFatalOrClose
            | Error::ErrAlert(_)
            | Error::ErrHandshakeTimeout
            | Error::ErrVerifyDataMismatch
            | Error::ErrCookieMismatch
            | Error::ErrKeySignatureMismatch
            | Error::ErrInvalidCertificate
            | Error::ErrClientCertificateRequired
            | Error::ErrClientCertificateNotVerified
            | Error::ErrCipherSuiteNoIntersection
            | Error::ErrNoRemoteCertificate
            | Error::ErrClientRequiredButNoServerEms
            | Error::ErrServerRequiredButNoClientEms
            | Error::ErrUnsupportedProtocolVersion
            | Error::OtherDtlsErr(_) => ErrorKind::DtlsFailure,

            Error::ErrDuplicated
            | Error::ErrFailedToVerifyAuthTag
            | Error::SrtpSsrcDuplicated(_, _)
            | Error::SrtcpSsrcDuplicated(_, _)
            | Error::RtpFailedToVerifyAuthTag
            | Error::RtcpFailedToVerifyAuthTag
            | Error::RtcpInvalidLengthAuthTag(_, _)
            | Error::ErrInvalidMac
            | Error::AesGcm(_) => ErrorKind::CryptoFailure,

            Error::ErrConnClosed
            | Error::ErrConnectionClosed
            | Error::ErrClosed
            | Error::ErrAlreadyClosed
            | Error::ErrBufferClosed
            | Error::ErrStreamClosed
            | Error::ErrDataChannelClosed
            | Error::ErrAssociationClosedBeforeConn
            | Error::ErrAgentClosed
            | Error::ErrClientClosed
            | Error::ErrSCTPNotEstablished
            | Error::ErrSCTPTransportDTLS
            | Error::ErrICEConnectionNotStarted => ErrorKind::TransportClosed,

            Error::ErrNoCodecsAvailable
            | Error::ErrUnsupportedCodec
            | Error::ErrCodecNotFound
            | Error::CodecNotFound
            | Error::ErrSenderWithNoCodecs
            | Error::ErrRTPTransceiverCodecUnsupported
            | Error::ErrNoSuchSrtpProfile
            | Error::ErrNoSRTPProtectionProfile
            | Error::ErrServerNoMatchingSrtpProfile
            | Error::ErrClientNoMatchingSrtpProfile
            | Error::ErrUnsupportedFingerprintAlgorithm
            | Error::ErrNoPayloaderForCodec => ErrorKind::CapabilityUnsupported,

            Error::ErrBufferFull | Error::ErrBufferedAmountExceeded(_, _) => {
                ErrorKind::BackpressureExceeded
            }

            Error::ErrCancelled | Error::ErrCanceledByCaller => ErrorKind::Cancelled,

            _ => ErrorKind::Other,
        }
    }
}

#[derive(Debug, Error)]
#[error("io error: {0}")]
pub struct IoError(#[from] pub io::Error);

// Workaround for wanting PartialEq for io::Error.
impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(IoError(e))
    }
}

/// An escape hatch to preserve stack traces when we don't know the error.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StdError(pub Box<dyn std::error::Error + Send + Sync>);

impl PartialEq for StdError {
    fn eq(&self, _: &Self) -> bool {
        false
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct P256Error(#[source] p256::elliptic_curve::Error);

impl PartialEq for P256Error {
    fn eq(&self, _: &Self) -> bool {
        false
    }
}

impl From<p256::elliptic_curve::Error> for Error {
    fn from(e: p256::elliptic_curve::Error) -> Self {
        Error::P256(P256Error(e))
    }
}

impl From<SystemTimeError> for Error {
    fn from(e: SystemTimeError) -> Self {
        Error::Other(e.to_string())
    }
}

/// flatten_errs flattens multiple errors into one
pub fn flatten_errs(errs: Vec<impl Into<Error>>) -> Result<()> {
    if errs.is_empty() {
        Ok(())
    } else {
        let errs_strs: Vec<String> = errs.into_iter().map(|e| e.into().to_string()).collect();
        Err(Error::Other(errs_strs.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind() {
        assert_eq!(
            Error::ErrIncorrectSignalingState.kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            Error::ErrNoMatchingCertificateFingerprint.kind(),
            ErrorKind::FingerprintMismatch
        );
        assert_eq!(
            Error::ErrNoRemoteCandidates.kind(),
            ErrorKind::IceFailure(IceFailureReason::NoRemoteCandidates)
        );
        assert_eq!(
            Error::SrtpSsrcDuplicated(1, 2).kind(),
            ErrorKind::CryptoFailure
        );
        assert_eq!(Error::ErrConnClosed.kind(), ErrorKind::TransportClosed);
        assert_eq!(
            Error::ErrBufferedAmountExceeded(2, 1).kind(),
            ErrorKind::BackpressureExceeded
        );
        assert_eq!(Error::ErrShortBuffer.kind(), ErrorKind::Other);
    }

    #[test]
    fn test_flatten_errs() {
        assert!(flatten_errs(Vec::<Error>::new()).is_ok());
        let err = flatten_errs(vec![Error::ErrConnClosed, Error::ErrAlreadyClosed]).unwrap_err();
        assert_eq!(err, Error::Other("conn is closed\nalready closed".to_owned()));
    }
}
