//! TURN attributes of RFC 5766 / RFC 8656 on top of the STUN codec.

#[cfg(test)]
mod proto_test;

pub mod chandata;

use shared::error::*;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use stun::attributes::*;
use stun::checks::*;
use stun::message::*;
use stun::xoraddr::XorMappedAddress;

/// IANA protocol numbers carried in REQUESTED-TRANSPORT.
pub const PROTO_TCP: u8 = 6;
pub const PROTO_UDP: u8 = 17;

/// Default lifetime of an allocation, RFC 5766 Section 2.2.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(10 * 60);

/// REQUESTED-TRANSPORT attribute, RFC 5766 Section 14.7.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedTransport {
    pub protocol: u8,
}

const REQUESTED_TRANSPORT_SIZE: usize = 4;

impl fmt::Display for RequestedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let proto = match self.protocol {
            PROTO_TCP => "TCP".to_owned(),
            PROTO_UDP => "UDP".to_owned(),
            p => p.to_string(),
        };
        write!(f, "protocol: {proto}")
    }
}

impl Setter for RequestedTransport {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        // protocol byte followed by 24 bits RFFU
        m.add(ATTR_REQUESTED_TRANSPORT, &[self.protocol, 0, 0, 0]);
        Ok(())
    }
}

impl Getter for RequestedTransport {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        let v = m.get(ATTR_REQUESTED_TRANSPORT)?;
        check_size(ATTR_REQUESTED_TRANSPORT, v.len(), REQUESTED_TRANSPORT_SIZE)?;
        self.protocol = v[0];
        Ok(())
    }
}

/// LIFETIME attribute, RFC 5766 Section 14.2. Encoded in whole seconds.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifetime(pub Duration);

const LIFETIME_SIZE: usize = 4;

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0.as_secs())
    }
}

impl Setter for Lifetime {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let secs = self.0.as_secs().min(u32::MAX as u64) as u32;
        m.add(ATTR_LIFETIME, &secs.to_be_bytes());
        Ok(())
    }
}

impl Getter for Lifetime {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        let v = m.get(ATTR_LIFETIME)?;
        check_size(ATTR_LIFETIME, v.len(), LIFETIME_SIZE)?;
        let secs = u32::from_be_bytes([v[0], v[1], v[2], v[3]]);
        self.0 = Duration::from_secs(secs as u64);
        Ok(())
    }
}

/// DONT-FRAGMENT attribute, RFC 5766 Section 14.8. Has no value.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DontFragmentAttr;

impl Setter for DontFragmentAttr {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        m.add(ATTR_DONT_FRAGMENT, &[]);
        Ok(())
    }
}

impl DontFragmentAttr {
    pub fn is_set(m: &Message) -> bool {
        m.contains(ATTR_DONT_FRAGMENT)
    }
}

/// DATA attribute, RFC 5766 Section 14.4.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Data(pub Vec<u8>);

impl Setter for Data {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        m.add(ATTR_DATA, &self.0);
        Ok(())
    }
}

impl Getter for Data {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        self.0 = m.get(ATTR_DATA)?;
        Ok(())
    }
}

macro_rules! xor_address_attr {
    ($(#[$doc:meta])* $name:ident, $attr:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name {
            pub ip: IpAddr,
            pub port: u16,
        }

        impl Default for $name {
            fn default() -> Self {
                $name {
                    ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    port: 0,
                }
            }
        }

        impl From<SocketAddr> for $name {
            fn from(addr: SocketAddr) -> Self {
                $name {
                    ip: addr.ip(),
                    port: addr.port(),
                }
            }
        }

        impl From<$name> for SocketAddr {
            fn from(a: $name) -> Self {
                SocketAddr::new(a.ip, a.port)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", SocketAddr::new(self.ip, self.port))
            }
        }

        impl Setter for $name {
            fn add_to(&self, m: &mut Message) -> Result<()> {
                XorMappedAddress {
                    ip: self.ip,
                    port: self.port,
                }
                .add_to_as(m, $attr)
            }
        }

        impl Getter for $name {
            fn get_from(&mut self, m: &Message) -> Result<()> {
                let mut a = XorMappedAddress::default();
                a.get_from_as(m, $attr)?;
                self.ip = a.ip;
                self.port = a.port;
                Ok(())
            }
        }
    };
}

xor_address_attr!(
    /// XOR-PEER-ADDRESS attribute, RFC 5766 Section 14.3.
    PeerAddress,
    ATTR_XOR_PEER_ADDRESS
);

xor_address_attr!(
    /// XOR-RELAYED-ADDRESS attribute, RFC 5766 Section 14.5.
    RelayedAddress,
    ATTR_XOR_RELAYED_ADDRESS
);
