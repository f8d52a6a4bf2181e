//! Everything a peer connection is created from.
//!
//! ```
//! use rtc::interceptor::Registry;
//! use rtc::peer_connection::configuration::interceptor_registry::register_default_interceptors;
//! use rtc::peer_connection::configuration::media_engine::MediaEngine;
//! use rtc::peer_connection::configuration::RTCConfigurationBuilder;
//! use rtc::peer_connection::transport::RTCIceServer;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut media_engine = MediaEngine::default();
//! media_engine.register_default_codecs()?;
//! let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;
//!
//! let configuration = RTCConfigurationBuilder::new()
//!     .with_ice_servers(vec![RTCIceServer {
//!         urls: vec!["stun:stun.l.google.com:19302".to_owned()],
//!         ..Default::default()
//!     }])
//!     .with_media_engine(media_engine)
//!     .with_interceptor_registry(registry)
//!     .build();
//! # let _ = configuration;
//! # Ok(())
//! # }
//! ```

pub mod interceptor_registry;
pub mod media_engine;
pub mod offer_answer_options;
pub mod policy;
pub mod setting_engine;

use interceptor::{Interceptor, NoopInterceptor, Registry};

use crate::peer_connection::certificate::RTCCertificate;
use crate::peer_connection::transport::ice::server::strip_query;
use crate::peer_connection::transport::RTCIceServer;
use media_engine::MediaEngine;
use policy::{RTCBundlePolicy, RTCIceTransportPolicy, RTCRtcpMuxPolicy};
use setting_engine::SettingEngine;

pub(crate) const UNSPECIFIED_STR: &str = "Unspecified";

/// Options of a peer connection: the W3C `RTCConfiguration` members plus
/// the codecs, transport knobs and interceptor chain it runs with.
///
/// * [W3C RTCConfiguration](https://w3c.github.io/webrtc-pc/#rtcconfiguration-dictionary)
pub struct RTCConfiguration<I = NoopInterceptor> {
    pub(crate) ice_servers: Vec<RTCIceServer>,
    pub(crate) ice_transport_policy: RTCIceTransportPolicy,
    pub(crate) bundle_policy: RTCBundlePolicy,
    pub(crate) rtcp_mux_policy: RTCRtcpMuxPolicy,
    /// Generated when empty.
    pub(crate) certificates: Vec<RTCCertificate>,

    pub(crate) media_engine: MediaEngine,
    pub(crate) setting_engine: SettingEngine,
    pub(crate) interceptor: I,
}

impl<I> RTCConfiguration<I> {
    /// ICE servers with the query stripped from STUN urls.
    pub(crate) fn get_ice_servers(&self) -> Vec<RTCIceServer> {
        let mut ice_servers = self.ice_servers.clone();
        for ice_server in &mut ice_servers {
            for url in &mut ice_server.urls {
                *url = strip_query(url);
            }
        }
        ice_servers
    }

    pub fn ice_transport_policy(&self) -> RTCIceTransportPolicy {
        self.ice_transport_policy
    }

    pub fn bundle_policy(&self) -> RTCBundlePolicy {
        self.bundle_policy
    }

    pub fn rtcp_mux_policy(&self) -> RTCRtcpMuxPolicy {
        self.rtcp_mux_policy
    }
}

pub struct RTCConfigurationBuilder<P = NoopInterceptor> {
    ice_servers: Vec<RTCIceServer>,
    ice_transport_policy: RTCIceTransportPolicy,
    bundle_policy: RTCBundlePolicy,
    rtcp_mux_policy: RTCRtcpMuxPolicy,
    certificates: Vec<RTCCertificate>,

    media_engine: MediaEngine,
    setting_engine: SettingEngine,
    registry: Registry<P>,
}

impl Default for RTCConfigurationBuilder<NoopInterceptor> {
    fn default() -> Self {
        Self::new()
    }
}

impl RTCConfigurationBuilder<NoopInterceptor> {
    pub fn new() -> Self {
        Self {
            ice_servers: vec![],
            ice_transport_policy: RTCIceTransportPolicy::All,
            bundle_policy: RTCBundlePolicy::Balanced,
            rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
            certificates: vec![],
            media_engine: MediaEngine::default(),
            setting_engine: SettingEngine::default(),
            registry: Registry::new(),
        }
    }
}

impl<P: Interceptor> RTCConfigurationBuilder<P> {
    pub fn with_ice_servers(mut self, ice_servers: Vec<RTCIceServer>) -> Self {
        self.ice_servers = ice_servers;
        self
    }

    pub fn with_ice_transport_policy(
        mut self,
        ice_transport_policy: RTCIceTransportPolicy,
    ) -> Self {
        self.ice_transport_policy = ice_transport_policy;
        self
    }

    pub fn with_bundle_policy(mut self, bundle_policy: RTCBundlePolicy) -> Self {
        self.bundle_policy = bundle_policy;
        self
    }

    pub fn with_rtcp_mux_policy(mut self, rtcp_mux_policy: RTCRtcpMuxPolicy) -> Self {
        self.rtcp_mux_policy = rtcp_mux_policy;
        self
    }

    pub fn with_certificates(mut self, certificates: Vec<RTCCertificate>) -> Self {
        self.certificates = certificates;
        self
    }

    pub fn with_media_engine(mut self, media_engine: MediaEngine) -> Self {
        self.media_engine = media_engine;
        self
    }

    pub fn with_setting_engine(mut self, setting_engine: SettingEngine) -> Self {
        self.setting_engine = setting_engine;
        self
    }

    /// Replaces the interceptor chain. Media engine changes made while
    /// configuring the registry must be passed with
    /// [`with_media_engine`](Self::with_media_engine) as well.
    pub fn with_interceptor_registry<Q: Interceptor>(
        self,
        registry: Registry<Q>,
    ) -> RTCConfigurationBuilder<Q> {
        RTCConfigurationBuilder {
            ice_servers: self.ice_servers,
            ice_transport_policy: self.ice_transport_policy,
            bundle_policy: self.bundle_policy,
            rtcp_mux_policy: self.rtcp_mux_policy,
            certificates: self.certificates,
            media_engine: self.media_engine,
            setting_engine: self.setting_engine,
            registry,
        }
    }

    pub fn build(self) -> RTCConfiguration<P> {
        RTCConfiguration {
            ice_servers: self.ice_servers,
            ice_transport_policy: self.ice_transport_policy,
            bundle_policy: self.bundle_policy,
            rtcp_mux_policy: self.rtcp_mux_policy,
            certificates: self.certificates,
            media_engine: self.media_engine,
            setting_engine: self.setting_engine,
            interceptor: self.registry.build(),
        }
    }
}
