
pub(crate) mod param_outgoing_reset_request;
pub(crate) mod param_reconfig_response;

use crate::chunk::chunk_type::ChunkType;
use crate::util::get_padding_size;
use param_outgoing_reset_request::ParamOutgoingResetRequest;
use param_reconfig_response::ParamReconfigResponse;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use shared::error::{Error, Result};
use std::fmt;

pub(crate) const PARAM_HEADER_LENGTH: usize = 4;

pub(crate) const PT_HEARTBEAT_INFO: u16 = 1;
pub(crate) const PT_STATE_COOKIE: u16 = 7;
pub(crate) const PT_UNRECOGNIZED_PARAM: u16 = 8;
pub(crate) const PT_OUT_SSN_RESET_REQ: u16 = 13;
pub(crate) const PT_RECONFIG_RESP: u16 = 16;
pub(crate) const PT_SUPPORTED_EXT: u16 = 0x8008;
pub(crate) const PT_FORWARD_TSN_SUPP: u16 = 0xc000;

/// A variable-length parameter carried by INIT, INIT ACK, HEARTBEAT and RE-CONFIG chunks.
///
///```text
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///|          Parameter Type       |       Parameter Length        |
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///\                                                               \
////                       Parameter Value                         /
///\                                                               \
///+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///```
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Param {
    HeartbeatInfo(Bytes),
    StateCookie(Bytes),
    UnrecognizedParam(Bytes),
    SupportedExtensions(Vec<ChunkType>),
    ForwardTsnSupported,
    OutgoingResetRequest(ParamOutgoingResetRequest),
    ReconfigResponse(ParamReconfigResponse),
    Unknown { typ: u16, value: Bytes },
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::HeartbeatInfo(info) => write!(f, "HeartbeatInfo({} bytes)", info.len()),
            Param::StateCookie(cookie) => write!(f, "StateCookie({} bytes)", cookie.len()),
            Param::UnrecognizedParam(raw) => write!(f, "UnrecognizedParam({} bytes)", raw.len()),
            Param::SupportedExtensions(types) => {
                let types: Vec<String> = types.iter().map(|t| t.to_string()).collect();
                write!(f, "SupportedExtensions({})", types.join(","))
            }
            Param::ForwardTsnSupported => write!(f, "ForwardTsnSupported"),
            Param::OutgoingResetRequest(p) => write!(f, "{p}"),
            Param::ReconfigResponse(p) => write!(f, "{p}"),
            Param::Unknown { typ, value } => write!(f, "Unknown({typ}, {} bytes)", value.len()),
        }
    }
}

impl Param {
    pub(crate) fn param_type(&self) -> u16 {
        match self {
            Param::HeartbeatInfo(_) => PT_HEARTBEAT_INFO,
            Param::StateCookie(_) => PT_STATE_COOKIE,
            Param::UnrecognizedParam(_) => PT_UNRECOGNIZED_PARAM,
            Param::SupportedExtensions(_) => PT_SUPPORTED_EXT,
            Param::ForwardTsnSupported => PT_FORWARD_TSN_SUPP,
            Param::OutgoingResetRequest(_) => PT_OUT_SSN_RESET_REQ,
            Param::ReconfigResponse(_) => PT_RECONFIG_RESP,
            Param::Unknown { typ, .. } => *typ,
        }
    }

    pub(crate) fn value_length(&self) -> usize {
        match self {
            Param::HeartbeatInfo(b) | Param::StateCookie(b) | Param::UnrecognizedParam(b) => {
                b.len()
            }
            Param::SupportedExtensions(types) => types.len(),
            Param::ForwardTsnSupported => 0,
            Param::OutgoingResetRequest(p) => p.value_length(),
            Param::ReconfigResponse(p) => p.value_length(),
            Param::Unknown { value, .. } => value.len(),
        }
    }

    /// Size of header and value, without trailing padding.
    pub(crate) fn marshal_size(&self) -> usize {
        PARAM_HEADER_LENGTH + self.value_length()
    }

    /// Writes header and value, without trailing padding.
    pub(crate) fn marshal_to(&self, writer: &mut BytesMut) {
        writer.put_u16(self.param_type());
        writer.put_u16(self.marshal_size() as u16);
        match self {
            Param::HeartbeatInfo(b) | Param::StateCookie(b) | Param::UnrecognizedParam(b) => {
                writer.extend_from_slice(b)
            }
            Param::SupportedExtensions(types) => {
                for t in types {
                    writer.put_u8(t.0);
                }
            }
            Param::ForwardTsnSupported => {}
            Param::OutgoingResetRequest(p) => p.marshal_value(writer),
            Param::ReconfigResponse(p) => p.marshal_value(writer),
            Param::Unknown { value, .. } => writer.extend_from_slice(value),
        }
    }

    /// Parses one parameter from the front of `raw`, returning it together with the number of
    /// bytes consumed including padding.
    pub(crate) fn unmarshal(raw: &Bytes) -> Result<(Self, usize)> {
        if raw.len() < PARAM_HEADER_LENGTH {
            return Err(Error::ErrParamHeaderTooShort);
        }

        let reader = &mut raw.slice(..PARAM_HEADER_LENGTH);
        let typ = reader.get_u16();
        let len = reader.get_u16() as usize;
        if len < PARAM_HEADER_LENGTH {
            return Err(Error::ErrParamHeaderSelfReportedLengthShorter);
        }
        if len > raw.len() {
            return Err(Error::ErrParamHeaderSelfReportedLengthLonger);
        }

        let value = raw.slice(PARAM_HEADER_LENGTH..len);
        let param = match typ {
            PT_HEARTBEAT_INFO => Param::HeartbeatInfo(value),
            PT_STATE_COOKIE => Param::StateCookie(value),
            PT_UNRECOGNIZED_PARAM => Param::UnrecognizedParam(value),
            PT_SUPPORTED_EXT => {
                Param::SupportedExtensions(value.iter().map(|t| ChunkType(*t)).collect())
            }
            PT_FORWARD_TSN_SUPP => Param::ForwardTsnSupported,
            PT_OUT_SSN_RESET_REQ => {
                Param::OutgoingResetRequest(ParamOutgoingResetRequest::unmarshal_value(&value)?)
            }
            PT_RECONFIG_RESP => {
                Param::ReconfigResponse(ParamReconfigResponse::unmarshal_value(&value)?)
            }
            _ => Param::Unknown { typ, value },
        };

        let consumed = std::cmp::min(len + get_padding_size(len), raw.len());
        Ok((param, consumed))
    }
}

/// Parses a run of parameters until `raw` is exhausted.
pub(crate) fn unmarshal_params(raw: &Bytes) -> Result<Vec<Param>> {
    let mut params = vec![];
    let mut offset = 0;
    while offset + PARAM_HEADER_LENGTH <= raw.len() {
        let (param, consumed) = Param::unmarshal(&raw.slice(offset..))?;
        params.push(param);
        offset += consumed;
    }
    Ok(params)
}

/// Length of a run of parameters where every parameter but the last is padded.
pub(crate) fn params_length(params: &[Param]) -> usize {
    let mut length = 0;
    for (idx, p) in params.iter().enumerate() {
        length += p.marshal_size();
        if idx != params.len() - 1 {
            length += get_padding_size(p.marshal_size());
        }
    }
    length
}

pub(crate) fn marshal_params(params: &[Param], writer: &mut BytesMut) {
    for (idx, p) in params.iter().enumerate() {
        p.marshal_to(writer);
        if idx != params.len() - 1 {
            let padding = get_padding_size(p.marshal_size());
            writer.extend_from_slice(&[0u8; 4][..padding]);
        }
    }
}
